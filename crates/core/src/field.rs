//! Typed field trees with preorder offsets
//!
//! A record's data is a tree of [`PvField`]s rooted at a [`PvStructure`].
//! Every field in the tree is numbered by a preorder walk of the type tree:
//! the root gets offset 0, each member the next integer, and a field's
//! `next_offset` is one past the offset of its last descendant. The interval
//! `[offset, next_offset)` therefore covers a field and everything below it,
//! which is what the record engine uses for O(depth) lookups.
//!
//! Offsets are assigned once when the value tree is created from its
//! [`StructureType`] and never change afterwards. No `&mut PvField` is ever
//! handed out: mutation goes through [`FieldMut`], which can only replace
//! leaf values, so the shape of a tree is fixed for its lifetime.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

// =============================================================================
// Scalars
// =============================================================================

/// Element type of a scalar or scalar array field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// `bool`
    Boolean,
    /// `i8`
    Byte,
    /// `i16`
    Short,
    /// `i32`
    Int,
    /// `i64`
    Long,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// UTF-8 string
    String,
}

impl ScalarType {
    /// Lowercase type name as it appears in printed field trees
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Boolean => "boolean",
            ScalarType::Byte => "byte",
            ScalarType::Short => "short",
            ScalarType::Int => "int",
            ScalarType::Long => "long",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::String => "string",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single scalar value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// Boolean value
    Boolean(bool),
    /// 8-bit signed integer
    Byte(i8),
    /// 16-bit signed integer
    Short(i16),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// String value
    String(String),
}

impl Scalar {
    /// Zero value for a scalar type
    pub fn default_for(scalar_type: ScalarType) -> Self {
        match scalar_type {
            ScalarType::Boolean => Scalar::Boolean(false),
            ScalarType::Byte => Scalar::Byte(0),
            ScalarType::Short => Scalar::Short(0),
            ScalarType::Int => Scalar::Int(0),
            ScalarType::Long => Scalar::Long(0),
            ScalarType::Float => Scalar::Float(0.0),
            ScalarType::Double => Scalar::Double(0.0),
            ScalarType::String => Scalar::String(String::new()),
        }
    }

    /// Type of this value
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Boolean(_) => ScalarType::Boolean,
            Scalar::Byte(_) => ScalarType::Byte,
            Scalar::Short(_) => ScalarType::Short,
            Scalar::Int(_) => ScalarType::Int,
            Scalar::Long(_) => ScalarType::Long,
            Scalar::Float(_) => ScalarType::Float,
            Scalar::Double(_) => ScalarType::Double,
            Scalar::String(_) => ScalarType::String,
        }
    }

    /// Numeric value widened to `f64`, `None` for booleans and strings
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::Byte(v) => Some(v as f64),
            Scalar::Short(v) => Some(v as f64),
            Scalar::Int(v) => Some(v as f64),
            Scalar::Long(v) => Some(v as f64),
            Scalar::Float(v) => Some(v as f64),
            Scalar::Double(v) => Some(v),
            Scalar::Boolean(_) | Scalar::String(_) => None,
        }
    }

    /// Integer value widened to `i64`, `None` for non-integer types
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::Byte(v) => Some(v as i64),
            Scalar::Short(v) => Some(v as i64),
            Scalar::Int(v) => Some(v as i64),
            Scalar::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean value, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Scalar::Boolean(v) => Some(v),
            _ => None,
        }
    }

    /// String value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(v) => write!(f, "{}", v),
            Scalar::Byte(v) => write!(f, "{}", v),
            Scalar::Short(v) => write!(f, "{}", v),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Long(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Double(v) => write!(f, "{}", v),
            Scalar::String(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Scalar::$variant(v)
                }
            }
        )*
    };
}

scalar_from! {
    bool => Boolean,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

// =============================================================================
// Type descriptors
// =============================================================================

/// Type descriptor for one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A single scalar
    Scalar(ScalarType),
    /// A variable-length array of scalars
    ScalarArray(ScalarType),
    /// A composite of named members
    Structure(StructureType),
}

impl FieldType {
    /// Whether this is a composite type
    pub fn is_structure(&self) -> bool {
        matches!(self, FieldType::Structure(_))
    }

    /// Number of offsets this type occupies: itself plus every descendant
    pub fn field_count(&self) -> usize {
        match self {
            FieldType::Structure(s) => 1 + s.fields.iter().map(|(_, t)| t.field_count()).sum::<usize>(),
            _ => 1,
        }
    }
}

impl From<StructureType> for FieldType {
    fn from(s: StructureType) -> Self {
        FieldType::Structure(s)
    }
}

/// Ordered, named members of a composite type
#[derive(Debug, Clone, PartialEq)]
pub struct StructureType {
    id: String,
    fields: Vec<(String, FieldType)>,
}

impl StructureType {
    /// Start building a structure type with the given type id
    pub fn builder(id: impl Into<String>) -> StructureBuilder {
        StructureBuilder {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Construct without checking member names; callers guarantee uniqueness
    pub(crate) fn from_parts(id: &str, fields: Vec<(String, FieldType)>) -> Self {
        Self {
            id: id.to_string(),
            fields,
        }
    }

    /// Type id (may be empty)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Members in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Member type by name
    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Number of direct members
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the structure has no members
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Fluent builder for [`StructureType`]
#[derive(Debug, Clone)]
pub struct StructureBuilder {
    id: String,
    fields: Vec<(String, FieldType)>,
}

impl StructureBuilder {
    /// Append a member of any type
    pub fn add(mut self, name: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        self.fields.push((name.into(), field_type.into()));
        self
    }

    /// Append a scalar member
    pub fn add_scalar(self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.add(name, FieldType::Scalar(scalar_type))
    }

    /// Append a scalar array member
    pub fn add_array(self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.add(name, FieldType::ScalarArray(scalar_type))
    }

    /// Finish the type
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateField`] if two members share a name.
    pub fn build(self) -> Result<StructureType> {
        for (i, (name, _)) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|(n, _)| n == name) {
                return Err(Error::DuplicateField(name.clone()));
            }
        }
        Ok(StructureType {
            id: self.id,
            fields: self.fields,
        })
    }
}

// =============================================================================
// Values
// =============================================================================

/// Value held by a [`PvField`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Scalar value
    Scalar(Scalar),
    /// Scalar array with its declared element type
    ScalarArray {
        /// Declared element type
        element: ScalarType,
        /// Current elements
        values: Vec<Scalar>,
    },
    /// Structure members
    Structure {
        /// Type id of the structure
        id: String,
        /// Member values in declaration order
        fields: Vec<PvField>,
    },
}

/// One node of a typed value tree
#[derive(Debug, Clone, PartialEq)]
pub struct PvField {
    name: String,
    offset: usize,
    next_offset: usize,
    value: FieldValue,
}

impl PvField {
    fn build(name: &str, field_type: &FieldType, next: &mut usize) -> PvField {
        let offset = *next;
        *next += 1;
        let value = match field_type {
            FieldType::Scalar(t) => FieldValue::Scalar(Scalar::default_for(*t)),
            FieldType::ScalarArray(t) => FieldValue::ScalarArray {
                element: *t,
                values: Vec::new(),
            },
            FieldType::Structure(s) => FieldValue::Structure {
                id: s.id.clone(),
                fields: s
                    .fields
                    .iter()
                    .map(|(n, t)| PvField::build(n, t, next))
                    .collect(),
            },
        };
        PvField {
            name: name.to_string(),
            offset,
            next_offset: *next,
            value,
        }
    }

    /// Field name relative to its parent (empty for a root structure)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Preorder offset of this field
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// One past the offset of the last descendant
    pub fn next_offset(&self) -> usize {
        self.next_offset
    }

    /// Number of fields in `[offset, next_offset)`
    pub fn field_count(&self) -> usize {
        self.next_offset - self.offset
    }

    /// Whether `offset` falls inside this field's interval
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.offset <= offset && offset < self.next_offset
    }

    /// Current value
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Whether this field is a structure
    pub fn is_structure(&self) -> bool {
        matches!(self.value, FieldValue::Structure { .. })
    }

    /// Structure type id, `None` for non-structures
    pub fn structure_id(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Structure { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Declared scalar type of a scalar or the element type of an array
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match &self.value {
            FieldValue::Scalar(s) => Some(s.scalar_type()),
            FieldValue::ScalarArray { element, .. } => Some(*element),
            FieldValue::Structure { .. } => None,
        }
    }

    /// Scalar value, `None` unless this is a scalar field
    pub fn scalar(&self) -> Option<&Scalar> {
        match &self.value {
            FieldValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Array elements, `None` unless this is an array field
    pub fn array(&self) -> Option<&[Scalar]> {
        match &self.value {
            FieldValue::ScalarArray { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Direct members of a structure; empty for leaves
    pub fn children(&self) -> &[PvField] {
        match &self.value {
            FieldValue::Structure { fields, .. } => fields,
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> &mut [PvField] {
        match &mut self.value {
            FieldValue::Structure { fields, .. } => fields,
            _ => &mut [],
        }
    }

    /// Look up a descendant by dotted path relative to this field
    ///
    /// An empty path returns `self`.
    pub fn sub_field(&self, path: &str) -> Option<&PvField> {
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for part in path.split('.') {
            current = current.children().iter().find(|f| f.name == part)?;
        }
        Some(current)
    }

    fn find_mut(&mut self, path: &str) -> Option<&mut PvField> {
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for part in path.split('.') {
            current = current.children_mut().iter_mut().find(|f| f.name == part)?;
        }
        Some(current)
    }

    /// Find the field whose offset is exactly `offset`
    ///
    /// Descends by interval containment, so the cost is O(depth * width).
    pub fn field_at(&self, offset: usize) -> Option<&PvField> {
        let mut current = self;
        loop {
            if current.offset == offset {
                return Some(current);
            }
            current = current
                .children()
                .iter()
                .find(|c| c.contains_offset(offset))?;
        }
    }

    fn locate_mut(&mut self, offset: usize) -> Option<&mut PvField> {
        if self.offset == offset {
            return Some(self);
        }
        self.children_mut()
            .iter_mut()
            .find(|c| c.contains_offset(offset))?
            .locate_mut(offset)
    }

    fn set_scalar(&mut self, value: Scalar) -> Result<()> {
        match &mut self.value {
            FieldValue::Scalar(current) => {
                if current.scalar_type() != value.scalar_type() {
                    return Err(Error::TypeMismatch {
                        field: self.name.clone(),
                        expected: current.scalar_type(),
                        actual: value.scalar_type(),
                    });
                }
                *current = value;
                Ok(())
            }
            FieldValue::ScalarArray { element, .. } => Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: *element,
                actual: value.scalar_type(),
            }),
            FieldValue::Structure { .. } => Err(Error::IsAStructure(self.name.clone())),
        }
    }

    fn set_array(&mut self, new_values: Vec<Scalar>) -> Result<()> {
        match &mut self.value {
            FieldValue::ScalarArray { element, values } => {
                if let Some(bad) = new_values.iter().find(|v| v.scalar_type() != *element) {
                    return Err(Error::TypeMismatch {
                        field: self.name.clone(),
                        expected: *element,
                        actual: bad.scalar_type(),
                    });
                }
                *values = new_values;
                Ok(())
            }
            FieldValue::Scalar(current) => Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: current.scalar_type(),
                actual: new_values
                    .first()
                    .map(Scalar::scalar_type)
                    .unwrap_or(current.scalar_type()),
            }),
            FieldValue::Structure { .. } => Err(Error::IsAStructure(self.name.clone())),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "    ".repeat(depth);
        match &self.value {
            FieldValue::Scalar(s) => writeln!(f, "{}{} {} {}", indent, s.scalar_type(), self.name, s),
            FieldValue::ScalarArray { element, values } => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                writeln!(f, "{}{}[] {} [{}]", indent, element, self.name, items.join(","))
            }
            FieldValue::Structure { id, fields } => {
                match (id.is_empty(), self.name.is_empty()) {
                    (true, true) => writeln!(f, "{}structure", indent)?,
                    (true, false) => writeln!(f, "{}structure {}", indent, self.name)?,
                    (false, true) => writeln!(f, "{}{}", indent, id)?,
                    (false, false) => writeln!(f, "{}{} {}", indent, id, self.name)?,
                }
                for child in fields {
                    child.fmt_indented(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for PvField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

// =============================================================================
// Value-level mutation
// =============================================================================

/// Write access to the values below one field
///
/// Reads go through `Deref` to [`PvField`]. Writes are limited to leaf values
/// and are type checked, so names, offsets and the structure layout can not
/// be changed through a `FieldMut`.
pub struct FieldMut<'a> {
    field: &'a mut PvField,
}

impl<'a> FieldMut<'a> {
    /// Replace a scalar value
    ///
    /// # Errors
    ///
    /// Fails with [`Error::TypeMismatch`] if the value type differs from the
    /// declared type or this is an array, and [`Error::IsAStructure`] if this
    /// field is a structure.
    pub fn set_scalar(&mut self, value: impl Into<Scalar>) -> Result<()> {
        self.field.set_scalar(value.into())
    }

    /// Replace the elements of an array field
    ///
    /// # Errors
    ///
    /// Fails with [`Error::TypeMismatch`] if any element has the wrong type
    /// or this is a scalar, and [`Error::IsAStructure`] for a structure.
    pub fn set_array(&mut self, values: Vec<Scalar>) -> Result<()> {
        self.field.set_array(values)
    }

    /// Descendant by dotted path; an empty path is this field
    pub fn sub_field_mut(&mut self, path: &str) -> Option<FieldMut<'_>> {
        self.field.find_mut(path).map(|field| FieldMut { field })
    }

    /// Descendant by offset
    pub fn field_at_mut(&mut self, offset: usize) -> Option<FieldMut<'_>> {
        self.field.locate_mut(offset).map(|field| FieldMut { field })
    }

    /// Consume the handle, keeping its lifetime for the descendant
    pub fn into_sub_field(self, path: &str) -> Option<FieldMut<'a>> {
        let field = self.field;
        field.find_mut(path).map(|field| FieldMut { field })
    }
}

impl Deref for FieldMut<'_> {
    type Target = PvField;

    fn deref(&self) -> &PvField {
        &*self.field
    }
}

impl fmt::Debug for FieldMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldMut").field(&self.field.name).finish()
    }
}

/// Root value of a record: an unnamed structure at offset 0
#[derive(Debug, Clone, PartialEq)]
pub struct PvStructure(PvField);

impl PvStructure {
    /// Create a value tree with default values and preorder offsets
    pub fn new(structure: &StructureType) -> Self {
        let mut next = 0;
        let root = PvField::build("", &FieldType::Structure(structure.clone()), &mut next);
        PvStructure(root)
    }

    /// Root field
    pub fn as_field(&self) -> &PvField {
        &self.0
    }

    /// Write access to the whole tree
    pub fn root_mut(&mut self) -> FieldMut<'_> {
        FieldMut { field: &mut self.0 }
    }

    /// Write access to a field by dotted path
    pub fn sub_field_mut(&mut self, path: &str) -> Option<FieldMut<'_>> {
        self.0.find_mut(path).map(|field| FieldMut { field })
    }

    /// Write access to a field by offset
    pub fn field_at_mut(&mut self, offset: usize) -> Option<FieldMut<'_>> {
        self.0.locate_mut(offset).map(|field| FieldMut { field })
    }
}

impl From<StructureType> for PvStructure {
    fn from(s: StructureType) -> Self {
        PvStructure::new(&s)
    }
}

impl Deref for PvStructure {
    type Target = PvField;

    fn deref(&self) -> &PvField {
        &self.0
    }
}

impl fmt::Display for PvStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
