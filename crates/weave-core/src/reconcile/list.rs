use std::rc::Rc;

use super::PatchContext;
use crate::binding::NodeBinding;
use crate::error::PatchError;
use crate::value::Value;
use crate::NodeId;

/// One anchored region per list element, matched by index.
///
/// Items are never moved: a value that changes index is patched as an
/// unrelated replacement at both indices.
#[derive(Default)]
pub(crate) struct ArrayBinding {
    items: Vec<NodeBinding>,
    values: Option<Rc<[Value]>>,
}

impl ArrayBinding {
    pub(crate) fn update(
        &mut self,
        cx: &mut PatchContext<'_>,
        parent: NodeId,
        end: NodeId,
        values: &Rc<[Value]>,
    ) -> Result<(), PatchError> {
        let previous = self.values.take();
        if let Some(previous) = &previous {
            if Rc::ptr_eq(previous, values) && self.items.iter().all(|item| item.is_settled(cx.doc)) {
                self.values = Some(Rc::clone(values));
                return Ok(());
            }
        }

        while self.items.len() > values.len() {
            if let Some(item) = self.items.pop() {
                item.dispose(cx.doc)?;
            }
        }

        for (index, value) in values.iter().enumerate() {
            if let Some(item) = self.items.get_mut(index) {
                let unchanged = previous
                    .as_ref()
                    .and_then(|previous| previous.get(index))
                    .is_some_and(|previous| previous.same(value));
                if unchanged && item.is_settled(cx.doc) {
                    continue;
                }
                item.update(cx, value)?;
            } else {
                let start = cx.doc.create_comment("");
                let item_end = cx.doc.create_comment("");
                cx.doc.insert_before(parent, start, Some(end))?;
                cx.doc.insert_before(parent, item_end, Some(end))?;
                let mut item = NodeBinding::new(start, item_end);
                item.update(cx, value)?;
                self.items.push(item);
            }
        }
        self.values = Some(Rc::clone(values));
        Ok(())
    }
}
