//! The object heap shared by both interpreters: arrays, structs, and
//! pointer targets, all keyed out of a single monotonically increasing id
//! counter. An array, a struct, and a pointer target allocated in sequence
//! never collide on the same id even though they live in separate tables —
//! ids are never reused and nothing is ever freed, since the interpreters
//! run one program to completion and are reset wholesale between runs.

use hashbrown::HashMap;
use seen_ir::Value;
use seen_common::RuntimeError;

#[derive(Debug, Default)]
pub struct Heap<P> {
    next_id: Value,
    arrays: HashMap<Value, Vec<Value>>,
    structs: HashMap<Value, HashMap<String, Value>>,
    pointers: HashMap<Value, P>,
}

impl<P> Heap<P> {
    pub fn new() -> Self {
        Self { next_id: 0, arrays: HashMap::new(), structs: HashMap::new(), pointers: HashMap::new() }
    }

    pub fn clear(&mut self) {
        self.next_id = 0;
        self.arrays.clear();
        self.structs.clear();
        self.pointers.clear();
    }

    fn next_id(&mut self) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn alloc_array(&mut self, elements: Vec<Value>) -> Value {
        let id = self.next_id();
        self.arrays.insert(id, elements);
        id
    }

    pub fn array(&self, id: Value) -> Result<&Vec<Value>, RuntimeError> {
        self.arrays.get(&id).ok_or(RuntimeError::InvalidArrayHandle { id })
    }

    pub fn array_mut(&mut self, id: Value) -> Result<&mut Vec<Value>, RuntimeError> {
        self.arrays.get_mut(&id).ok_or(RuntimeError::InvalidArrayHandle { id })
    }

    pub fn array_element(&self, id: Value, index: Value) -> Result<Value, RuntimeError> {
        let array = self.array(id)?;
        array.get(index as usize).copied().ok_or(RuntimeError::ArrayIndexOutOfRange { index, length: array.len() })
    }

    pub fn set_array_element(&mut self, id: Value, index: Value, value: Value) -> Result<(), RuntimeError> {
        let length = self.array(id)?.len();
        if index as usize >= length {
            return Err(RuntimeError::ArrayIndexOutOfRange { index, length });
        }
        self.array_mut(id)?[index as usize] = value;
        Ok(())
    }

    pub fn alloc_struct(&mut self, fields: HashMap<String, Value>) -> Value {
        let id = self.next_id();
        self.structs.insert(id, fields);
        id
    }

    pub fn struct_fields(&self, id: Value) -> Result<&HashMap<String, Value>, RuntimeError> {
        self.structs.get(&id).ok_or(RuntimeError::InvalidStructHandle { id })
    }

    pub fn struct_field(&self, id: Value, field: &str) -> Result<Value, RuntimeError> {
        self.struct_fields(id)?
            .get(field)
            .copied()
            .ok_or_else(|| RuntimeError::StructFieldMissing { field: field.to_string() })
    }

    pub fn alloc_pointer(&mut self, target: P) -> Value {
        let id = self.next_id();
        self.pointers.insert(id, target);
        id
    }

    pub fn pointer(&self, id: Value) -> Result<&P, RuntimeError> {
        self.pointers.get(&id).ok_or(RuntimeError::InvalidPointerHandle { id })
    }
}
