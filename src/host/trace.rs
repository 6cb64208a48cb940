//! Call-origin tracking.
//!
//! Host code announces what is running by entering named frames. A write
//! captures the current frame stack as its causality context, which is what
//! the noise filter inspects.

use std::cell::RefCell;
use std::fmt;

use serde::Serialize;

thread_local! {
    static CALL_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard for one entry on the call-origin stack. Popped on drop.
#[must_use = "the frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct CallFrame {
    depth: usize,
}

impl CallFrame {
    pub fn enter(label: impl Into<String>) -> Self {
        let depth = CALL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(label.into());
            stack.len()
        });
        Self { depth }
    }
}

impl Drop for CallFrame {
    fn drop(&mut self) {
        // Guards dropped out of order truncate back to their own depth.
        CALL_STACK.with(|stack| stack.borrow_mut().truncate(self.depth - 1));
    }
}

/// Run `f` inside a named frame.
pub fn within<T>(label: impl Into<String>, f: impl FnOnce() -> T) -> T {
    let _frame = CallFrame::enter(label);
    f()
}

/// Snapshot of the call-origin stack, innermost frame first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallTrace {
    frames: Vec<String>,
}

impl CallTrace {
    pub fn capture() -> Self {
        let frames = CALL_STACK.with(|stack| stack.borrow().iter().rev().cloned().collect());
        Self { frames }
    }

    pub fn from_frames<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
        }
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame that issued the write.
    pub fn origin(&self) -> Option<&str> {
        self.frames.first().map(String::as_str)
    }

    /// True if any frame contains `needle` verbatim.
    pub fn mentions(&self, needle: &str) -> bool {
        !needle.is_empty() && self.frames.iter().any(|frame| frame.contains(needle))
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return f.write_str("<top level>");
        }
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                f.write_str("\n    at ")?;
            } else {
                f.write_str("at ")?;
            }
            f.write_str(frame)?;
        }
        Ok(())
    }
}
