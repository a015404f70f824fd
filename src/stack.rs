//! The sheet stack. Index 0 is the active sheet.

use std::rc::Rc;

use crate::sheet::SheetRef;

#[derive(Default)]
pub struct SheetStack {
    sheets: Vec<SheetRef>,
}

impl SheetStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `sheet` active. A sheet already on the stack is moved to the
    /// head rather than pushed twice.
    pub fn push(&mut self, sheet: SheetRef) {
        self.sheets.retain(|s| !Rc::ptr_eq(s, &sheet));
        self.sheets.insert(0, sheet);
    }

    pub fn pop(&mut self) -> Option<SheetRef> {
        if self.sheets.is_empty() {
            None
        } else {
            Some(self.sheets.remove(0))
        }
    }

    pub fn clear(&mut self) {
        self.sheets.clear();
    }

    pub fn head(&self) -> Option<SheetRef> {
        self.sheets.first().cloned()
    }

    pub fn get(&self, index: usize) -> Option<SheetRef> {
        self.sheets.get(index).cloned()
    }

    pub fn position(&self, sheet: &SheetRef) -> Option<usize> {
        self.sheets.iter().position(|s| Rc::ptr_eq(s, sheet))
    }

    /// Exchanges the two topmost sheets.
    pub fn swap(&mut self) {
        if self.sheets.len() >= 2 {
            self.sheets.swap(0, 1);
        }
    }

    /// `n > 0` sends the head to the bottom; `n < 0` brings the bottom up.
    pub fn cycle(&mut self, n: isize) {
        if self.sheets.is_empty() {
            return;
        }
        let k = n.unsigned_abs() % self.sheets.len();
        if n > 0 {
            self.sheets.rotate_left(k);
        } else {
            self.sheets.rotate_right(k);
        }
    }

    /// Replaces the head with `sheet`.
    pub fn replace_head(&mut self, sheet: SheetRef) {
        self.pop();
        self.push(sheet);
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SheetRef> {
        self.sheets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{Sheet, SheetSource};

    fn names(stack: &SheetStack) -> Vec<String> {
        stack.iter().map(|s| s.borrow().name.clone()).collect()
    }

    fn sheet(name: &str) -> SheetRef {
        Sheet::new(name, SheetSource::None).into_ref()
    }

    #[test]
    fn test_push_dedupes_by_identity() {
        let mut stack = SheetStack::new();
        let a = sheet("a");
        stack.push(a.clone());
        stack.push(sheet("b"));
        stack.push(sheet("a"));
        assert_eq!(names(&stack), ["a", "b", "a"]);
        stack.push(a);
        assert_eq!(names(&stack), ["a", "a", "b"]);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_cycle_and_swap() {
        let mut stack = SheetStack::new();
        for n in ["c", "b", "a"] {
            stack.push(sheet(n));
        }
        stack.cycle(1);
        assert_eq!(names(&stack), ["b", "c", "a"]);
        stack.cycle(-1);
        assert_eq!(names(&stack), ["a", "b", "c"]);
        stack.swap();
        assert_eq!(names(&stack), ["b", "a", "c"]);
        stack.pop();
        stack.pop();
        stack.pop();
        assert!(stack.pop().is_none());
    }
}
