//! Stack and call frame management
//!
//! This module provides the operand stack and call frame records the VM
//! executes on. Both are GC roots: every slot below the stack pointer and the
//! closure of every active frame.
//!
//! # Memory Layout
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │ (unused capacity)                   │
//! ├─────────────────────────────────────┤  ← sp (stack pointer)
//! │   temporaries                       │
//! │   local₁                            │
//! │   local₀                            │
//! │   callee closure                    │  ← frame N slot_base
//! ├─────────────────────────────────────┤
//! │ Frame N-1                           │
//! │   ...                               │
//! └─────────────────────────────────────┘
//! ```

use crate::config::DEFAULT_MAX_STACK_SIZE;
use crate::gc::ObjId;
use crate::value::Value;
use crate::{VmError, VmResult};

/// Default maximum call depth
const DEFAULT_MAX_FRAMES: usize = 64;

/// Call frame for function invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallFrame {
    /// Closure being executed
    pub closure: ObjId,

    /// First stack slot owned by this frame
    pub slot_base: usize,
}

impl CallFrame {
    /// Create a new call frame
    pub fn new(closure: ObjId, slot_base: usize) -> Self {
        Self { closure, slot_base }
    }
}

/// Operand and call frame stack for the VM
pub struct Stack {
    /// Stack slots; only `slots[..sp]` are live
    slots: Vec<Value>,

    /// Call frames
    frames: Vec<CallFrame>,

    /// Stack pointer (points to next free slot)
    sp: usize,

    /// Maximum stack size (in slots)
    max_size: usize,

    /// Maximum number of frames
    max_frames: usize,
}

impl Stack {
    /// Create a new stack with default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_STACK_SIZE, DEFAULT_MAX_FRAMES)
    }

    /// Create a stack with specific limits
    pub fn with_limits(max_size: usize, max_frames: usize) -> Self {
        Self {
            slots: Vec::with_capacity(256),
            frames: Vec::with_capacity(max_frames.min(64)),
            sp: 0,
            max_size,
            max_frames,
        }
    }

    // ========================================================================
    // Operand Stack Operations
    // ========================================================================

    /// Push a value onto the stack
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the stack is full.
    #[inline]
    pub fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= self.max_size {
            return Err(VmError::StackOverflow);
        }

        if self.sp >= self.slots.len() {
            self.slots.push(value);
        } else {
            self.slots[self.sp] = value;
        }

        self.sp += 1;
        Ok(())
    }

    /// Pop a value from the stack
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if the stack is empty.
    #[inline]
    pub fn pop(&mut self) -> VmResult<Value> {
        if self.sp == 0 {
            return Err(VmError::StackUnderflow);
        }

        self.sp -= 1;
        Ok(self.slots[self.sp])
    }

    /// Peek at value N slots from top (0 = top)
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if not enough values on stack.
    #[inline]
    pub fn peek(&self, n: usize) -> VmResult<Value> {
        if self.sp <= n {
            return Err(VmError::StackUnderflow);
        }

        Ok(self.slots[self.sp - 1 - n])
    }

    /// Get value at absolute stack position
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if position is out of bounds.
    #[inline]
    pub fn get(&self, pos: usize) -> VmResult<Value> {
        if pos >= self.sp {
            return Err(VmError::StackUnderflow);
        }

        Ok(self.slots[pos])
    }

    /// Set value at absolute stack position
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if position is out of bounds.
    #[inline]
    pub fn set(&mut self, pos: usize, value: Value) -> VmResult<()> {
        if pos >= self.sp {
            return Err(VmError::StackUnderflow);
        }

        self.slots[pos] = value;
        Ok(())
    }

    /// Drop every slot at or above `sp`
    pub fn truncate(&mut self, sp: usize) {
        self.sp = self.sp.min(sp);
    }

    /// Get current stack depth
    #[inline]
    pub fn depth(&self) -> usize {
        self.sp
    }

    /// Check if stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    /// Live slots, bottom to top
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.slots[..self.sp]
    }

    // ========================================================================
    // Call Frame Management
    // ========================================================================

    /// Push a new call frame whose slots start at `slot_base`
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the call depth limit is reached.
    pub fn push_frame(&mut self, closure: ObjId, slot_base: usize) -> VmResult<()> {
        if self.frames.len() >= self.max_frames {
            return Err(VmError::StackOverflow);
        }
        self.frames.push(CallFrame::new(closure, slot_base.min(self.sp)));
        Ok(())
    }

    /// Pop the current call frame, discarding its slots
    ///
    /// # Errors
    ///
    /// Returns `VmError::FrameUnderflow` if no frames to pop.
    pub fn pop_frame(&mut self) -> VmResult<CallFrame> {
        let frame = self.frames.pop().ok_or(VmError::FrameUnderflow)?;
        self.truncate(frame.slot_base);
        Ok(frame)
    }

    /// Get the current call frame
    #[inline]
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// Get the number of active frames
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Active frames, outermost first
    #[inline]
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Reset to an empty stack with no frames
    pub fn reset(&mut self) {
        self.sp = 0;
        self.frames.clear();
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
