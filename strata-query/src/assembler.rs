//! Stitches the loaded objects into the response tree.
//!
//! The assembler walks the bound selection and the execution arena together.
//! It emits response keys in selection order and keeps lists in loader order;
//! it never sorts, deduplicates or drops rows. Failed branches become `null`
//! and contribute one [`FieldError`] per affected path.

use indexmap::IndexMap;

use strata_schema::ScalarField;

use crate::bind::{BoundField, BoundQuery};
use crate::planner::{Execution, Object, ObjectId, RootSlot, Slot};
use crate::response::{FieldError, PathSegment, Response, ResponseValue};

/// Build the response for a completed execution.
pub(crate) fn assemble(query: &BoundQuery<'_>, execution: &Execution<'_, '_>) -> Response {
    let mut assembler = Assembler {
        execution,
        path: Vec::new(),
        errors: Vec::new(),
    };

    let mut data = IndexMap::with_capacity(query.roots.len());
    for (root, slot) in query.roots.iter().zip(&execution.roots) {
        assembler
            .path
            .push(PathSegment::Key(root.response_key.clone()));
        let value = match slot {
            RootSlot::Rows(ids) => assembler.list(ids),
            RootSlot::Failed(index) => assembler.failed(*index),
        };
        assembler.path.pop();
        data.insert(root.response_key.clone(), value);
    }

    Response {
        data,
        errors: assembler.errors,
        cost: Default::default(),
    }
}

struct Assembler<'e, 'q, 's> {
    execution: &'e Execution<'q, 's>,
    path: Vec<PathSegment>,
    errors: Vec<FieldError>,
}

impl<'e> Assembler<'e, '_, '_> {
    fn list(&mut self, ids: &'e [ObjectId]) -> ResponseValue {
        let items = ids
            .iter()
            .enumerate()
            .map(|(index, &id)| {
                self.path.push(PathSegment::Index(index));
                let value = self.object(id);
                self.path.pop();
                value
            })
            .collect();
        ResponseValue::List(items)
    }

    fn object(&mut self, id: ObjectId) -> ResponseValue {
        let execution = self.execution;
        let Some(object) = execution.objects.get(id) else {
            return ResponseValue::Null;
        };
        if object.selection.is_ids_only() {
            return object.row.key.to_value().into();
        }

        let mut map = IndexMap::with_capacity(object.selection.fields.len());
        for (field, slot) in object.selection.fields.iter().zip(&object.slots) {
            let key = field.response_key().clone();
            self.path.push(PathSegment::Key(key.clone()));
            let value = match (field, slot) {
                (BoundField::Scalar { field, .. }, _) => scalar(object, field),
                (BoundField::Relation(_), Slot::Many(ids)) => self.list(ids),
                (BoundField::Relation(_), Slot::One(Some(child))) => self.object(*child),
                (BoundField::Relation(_), Slot::Failed(index)) => self.failed(*index),
                (BoundField::Relation(_), Slot::One(None) | Slot::Pending | Slot::Scalar) => {
                    ResponseValue::Null
                }
            };
            self.path.pop();
            map.insert(key, value);
        }
        ResponseValue::Object(map)
    }

    fn failed(&mut self, index: usize) -> ResponseValue {
        if let Some(error) = self.execution.failures.get(index) {
            self.errors.push(FieldError::new(self.path.clone(), error));
        }
        ResponseValue::Null
    }
}

fn scalar(object: &Object<'_, '_>, field: &ScalarField) -> ResponseValue {
    object
        .row
        .get(&field.name)
        .cloned()
        .map(ResponseValue::from)
        .unwrap_or_default()
}
