use std::sync::Arc;

use crate::location::TokenLocation;

/// One source being lexed: its name, its text and how far into it we are.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub name: Arc<str>,
    text: Arc<str>,
    offset: usize,
    line: usize,
    column: usize,
}

impl SourceFrame {
    pub fn new(name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rest(&self) -> &str {
        &self.text[self.offset..]
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.text.len()
    }

    pub fn location(&self) -> TokenLocation {
        TokenLocation::new(self.name.clone(), self.offset, self.line, self.column)
    }

    /// Move past the next `len` bytes, keeping line and column current.
    /// `len` is clamped to the end of the text and to a char boundary.
    pub fn advance(&mut self, len: usize) {
        let mut end = (self.offset + len).min(self.text.len());
        while !self.text.is_char_boundary(end) {
            end += 1;
        }
        for c in self.text[self.offset..end].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = end;
    }
}

/// LIFO stack of source frames. The frame on top is the one being lexed;
/// popping it resumes its parent exactly where the parent was suspended.
#[derive(Debug, Clone, Default)]
pub struct SourceStack {
    frames: Vec<SourceFrame>,
}

impl SourceStack {
    pub fn new(root: SourceFrame) -> Self {
        Self { frames: vec![root] }
    }

    pub fn push(&mut self, frame: SourceFrame) {
        log::trace!(target: "parse", "entering source {} (depth {})", frame.name, self.frames.len() + 1);
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<SourceFrame> {
        let frame = self.frames.pop();
        if let Some(frame) = &frame {
            log::trace!(target: "parse", "leaving source {}", frame.name);
        }
        frame
    }

    /// The frame lexing started from.
    pub fn root(&self) -> Option<&SourceFrame> {
        self.frames.first()
    }

    pub fn current(&self) -> Option<&SourceFrame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut SourceFrame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames.iter().any(|f| &*f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_tracks_lines_and_columns() {
        let mut frame = SourceFrame::new("t", "ab\ncd");
        frame.advance(4);
        let loc = frame.location();
        assert_eq!((loc.index, loc.line, loc.column), (4, 2, 2));
        frame.advance(100);
        assert!(frame.is_exhausted());
    }

    #[test]
    fn test_pop_resumes_parent_offset() {
        let mut root = SourceFrame::new("root", "one two");
        root.advance(4);
        let mut stack = SourceStack::new(root);
        stack.push(SourceFrame::new("child", "x"));
        assert!(stack.contains("child"));
        stack.pop();
        assert_eq!(stack.current().unwrap().rest(), "two");
    }
}
