//! Interned Midori types.
//!
//! Types are stored once in a [`TypeTable`] arena keyed by their
//! canonical textual form (`Int`, `Array<Int>`, `(Int, Frac) -> Bool`,
//! a struct or union name). Every consumer holds [`TypeId`] handles, so
//! structural equality reduces to handle equality.

use std::collections::HashMap;
use std::fmt;

/// Stable handle into a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

#[derive(Debug, Clone, PartialEq)]
pub struct UnionVariant {
    pub name: String,
    pub tag: u8,
    pub field_types: Vec<TypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MidoriType {
    Integer,
    Fraction,
    Text,
    Bool,
    Unit,
    Array {
        element: TypeId,
    },
    Function {
        params: Vec<TypeId>,
        ret: TypeId,
        is_foreign: bool,
    },
    Struct {
        name: String,
        member_names: Vec<String>,
        member_types: Vec<TypeId>,
    },
    Union {
        name: String,
        /// Declaration order; `variants[i].tag == i`.
        variants: Vec<UnionVariant>,
    },
}

#[derive(Debug)]
pub struct TypeTable {
    types: Vec<MidoriType>,
    names: Vec<String>,
    by_name: HashMap<String, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            names: Vec::new(),
            by_name: HashMap::new(),
        };
        table.insert("Int", MidoriType::Integer);
        table.insert("Frac", MidoriType::Fraction);
        table.insert("Text", MidoriType::Text);
        table.insert("Bool", MidoriType::Bool);
        table.insert("Unit", MidoriType::Unit);
        table
    }

    fn insert(&mut self, name: &str, ty: MidoriType) -> TypeId {
        if let Some(existing) = self.by_name.get(name) {
            return *existing;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, id: TypeId) -> &MidoriType {
        &self.types[id.0 as usize]
    }

    /// Canonical textual form of an interned type.
    pub fn name_of(&self, id: TypeId) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn integer(&self) -> TypeId {
        self.by_name["Int"]
    }

    pub fn fraction(&self) -> TypeId {
        self.by_name["Frac"]
    }

    pub fn text(&self) -> TypeId {
        self.by_name["Text"]
    }

    pub fn bool(&self) -> TypeId {
        self.by_name["Bool"]
    }

    pub fn unit(&self) -> TypeId {
        self.by_name["Unit"]
    }

    pub fn intern_array(&mut self, element: TypeId) -> TypeId {
        let name = format!("Array<{}>", self.name_of(element));
        self.insert(&name, MidoriType::Array { element })
    }

    pub fn intern_function(&mut self, params: Vec<TypeId>, ret: TypeId, is_foreign: bool) -> TypeId {
        let mut name = String::from("(");
        for (i, p) in params.iter().enumerate() {
            if i > 0 {
                name.push_str(", ");
            }
            name.push_str(self.name_of(*p));
        }
        name.push_str(") -> ");
        name.push_str(self.name_of(ret));
        if is_foreign {
            name.insert_str(0, "foreign ");
        }
        self.insert(
            &name,
            MidoriType::Function {
                params,
                ret,
                is_foreign,
            },
        )
    }

    /// Intern a struct under its declared name. Returns `None` when the
    /// name already names a type.
    pub fn insert_struct(
        &mut self,
        name: &str,
        member_names: Vec<String>,
        member_types: Vec<TypeId>,
    ) -> Option<TypeId> {
        if self.by_name.contains_key(name) {
            return None;
        }
        Some(self.insert(
            name,
            MidoriType::Struct {
                name: name.to_string(),
                member_names,
                member_types,
            },
        ))
    }

    /// Intern a union under its declared name. Returns `None` when the
    /// name already names a type.
    pub fn insert_union(&mut self, name: &str, variants: Vec<UnionVariant>) -> Option<TypeId> {
        if self.by_name.contains_key(name) {
            return None;
        }
        Some(self.insert(
            name,
            MidoriType::Union {
                name: name.to_string(),
                variants,
            },
        ))
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        matches!(self.get(id), MidoriType::Integer | MidoriType::Fraction)
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        id == self.integer()
    }

    pub fn is_fraction(&self, id: TypeId) -> bool {
        id == self.fraction()
    }

    pub fn is_text(&self, id: TypeId) -> bool {
        id == self.text()
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        id == self.bool()
    }

    pub fn is_atomic(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            MidoriType::Integer
                | MidoriType::Fraction
                | MidoriType::Text
                | MidoriType::Bool
                | MidoriType::Unit
        )
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.names {
            writeln!(f, "{}", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_interned_once() {
        let table = TypeTable::new();
        assert_eq!(table.lookup("Int"), Some(table.integer()));
        assert_eq!(table.lookup("Frac"), Some(table.fraction()));
        assert_eq!(table.lookup("Missing"), None);
    }

    #[test]
    fn test_array_interning_is_idempotent() {
        let mut table = TypeTable::new();
        let a = table.intern_array(table.integer());
        let int = table.integer();
        let b = table.intern_array(int);
        assert_eq!(a, b);
        assert_eq!(table.name_of(a), "Array<Int>");
    }

    #[test]
    fn test_nested_array_name() {
        let mut table = TypeTable::new();
        let inner = table.intern_array(table.integer());
        let outer = table.intern_array(inner);
        assert_eq!(table.name_of(outer), "Array<Array<Int>>");
    }

    #[test]
    fn test_function_interning() {
        let mut table = TypeTable::new();
        let (int, frac, boolean) = (table.integer(), table.fraction(), table.bool());
        let f1 = table.intern_function(vec![int, frac], boolean, false);
        let f2 = table.intern_function(vec![int, frac], boolean, false);
        assert_eq!(f1, f2);
        assert_eq!(table.name_of(f1), "(Int, Frac) -> Bool");
    }

    #[test]
    fn test_foreign_function_distinct_from_defined() {
        let mut table = TypeTable::new();
        let (int, unit) = (table.integer(), table.unit());
        let defined = table.intern_function(vec![int], unit, false);
        let foreign = table.intern_function(vec![int], unit, true);
        assert_ne!(defined, foreign);
    }

    #[test]
    fn test_struct_name_collision_rejected() {
        let mut table = TypeTable::new();
        let int = table.integer();
        assert!(table.insert_struct("Point", vec!["x".into()], vec![int]).is_some());
        assert!(table.insert_struct("Point", vec![], vec![]).is_none());
    }

    #[test]
    fn test_zero_param_function_name() {
        let mut table = TypeTable::new();
        let int = table.integer();
        let f = table.intern_function(vec![], int, false);
        assert_eq!(table.name_of(f), "() -> Int");
    }
}
