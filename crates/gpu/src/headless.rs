//! In-memory backend that records every driver call.
//!
//! Nothing is drawn. Buffers and textures keep their bytes in host memory
//! and every operation lands in a shared [`Journal`], which tests and the
//! CLI inspect to see exactly what reached the "driver".

use crate::backend::{
    Device, DrawCall, Extent, MapAccess, RawHandle, ShaderBackend, StorageBackend, StorageShape,
    TargetBackend,
};
use std::cell::RefCell;
use std::rc::Rc;
use tessera_common::{Error, Result};

/// A recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Create { label: String, bytes: usize },
    CreateTarget { label: String, width: u32, height: u32 },
    Destroy { label: String },
    Write { label: String, data: Vec<u8> },
    Map { label: String, access: MapAccess, bytes: usize },
    /// `data` holds the mapped bytes when the mapping allowed writes.
    Unmap { label: String, data: Option<Vec<u8>> },
    Compile { label: String },
    BindShader { label: String },
    SetBlock { shader: String, name: String },
    SetTexture { shader: String, name: String, unit: u32 },
    BindTarget { label: String },
    Draw { shader: String, streams: usize, vertices: u32, indices: u32 },
}

impl Op {
    /// Whether this call moved data into a buffer or texture.
    pub fn is_upload(&self) -> bool {
        matches!(self, Op::Write { .. } | Op::Unmap { data: Some(_), .. })
    }
}

/// Driver call that should fail the next time it is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Create,
    Write,
    Map,
    Compile,
    Draw,
}

#[derive(Debug, Default)]
pub struct Journal {
    ops: Vec<Op>,
    pending_failures: Vec<FailPoint>,
    next_handle: u64,
}

impl Journal {
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn count(&self, predicate: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| predicate(*op)).count()
    }

    /// Number of data transfers (writes and write-mappings).
    pub fn uploads(&self) -> usize {
        self.count(Op::is_upload)
    }

    pub fn draws(&self) -> usize {
        self.count(|op| matches!(op, Op::Draw { .. }))
    }

    /// Bytes of the most recent upload into `label`.
    pub fn last_upload(&self, label: &str) -> Option<&[u8]> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::Write { label: l, data } if l == label => Some(data.as_slice()),
            Op::Unmap {
                label: l,
                data: Some(data),
            } if l == label => Some(data.as_slice()),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    fn record(&mut self, op: Op) {
        tracing::trace!(?op, "headless op");
        self.ops.push(op);
    }

    fn check(&mut self, point: FailPoint, label: &str) -> Result<()> {
        match self.pending_failures.iter().position(|p| *p == point) {
            Some(i) => {
                self.pending_failures.remove(i);
                Err(Error::driver(format!("injected {point:?} failure on `{label}`")))
            }
            None => Ok(()),
        }
    }

    fn handle(&mut self) -> RawHandle {
        self.next_handle += 1;
        RawHandle(self.next_handle)
    }
}

/// Headless [`Device`]. Clones share one journal.
#[derive(Debug, Clone, Default)]
pub struct HeadlessDevice {
    journal: Rc<RefCell<Journal>>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Rc<RefCell<Journal>> {
        Rc::clone(&self.journal)
    }

    /// Makes the next call of this kind fail with a driver error.
    pub fn fail_next(&self, point: FailPoint) {
        self.journal.borrow_mut().pending_failures.push(point);
    }
}

impl Device for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn storage(&mut self, label: &str) -> Box<dyn StorageBackend> {
        Box::new(HeadlessStorage {
            label: label.to_string(),
            journal: self.journal(),
            memory: Vec::new(),
            access: None,
        })
    }

    fn shader(&mut self, label: &str) -> Box<dyn ShaderBackend> {
        Box::new(HeadlessShader {
            label: label.to_string(),
            journal: self.journal(),
        })
    }

    fn target(&mut self, label: &str) -> Box<dyn TargetBackend> {
        Box::new(HeadlessTarget {
            label: label.to_string(),
            journal: self.journal(),
        })
    }
}

struct HeadlessStorage {
    label: String,
    journal: Rc<RefCell<Journal>>,
    memory: Vec<u8>,
    access: Option<MapAccess>,
}

impl StorageBackend for HeadlessStorage {
    fn create(&mut self, shape: StorageShape) -> Result<RawHandle> {
        let mut journal = self.journal.borrow_mut();
        journal.check(FailPoint::Create, &self.label)?;
        self.memory = vec![0; shape.byte_size()];
        journal.record(Op::Create {
            label: self.label.clone(),
            bytes: shape.byte_size(),
        });
        Ok(journal.handle())
    }

    fn destroy(&mut self, _handle: RawHandle) {
        self.memory.clear();
        self.journal.borrow_mut().record(Op::Destroy {
            label: self.label.clone(),
        });
    }

    fn write(&mut self, _handle: RawHandle, data: &[u8]) -> Result<()> {
        let mut journal = self.journal.borrow_mut();
        journal.check(FailPoint::Write, &self.label)?;
        self.memory[..data.len()].copy_from_slice(data);
        journal.record(Op::Write {
            label: self.label.clone(),
            data: data.to_vec(),
        });
        Ok(())
    }

    fn start_map(&mut self, _handle: RawHandle, access: MapAccess, size: usize) -> Result<&mut [u8]> {
        let mut journal = self.journal.borrow_mut();
        journal.check(FailPoint::Map, &self.label)?;
        journal.record(Op::Map {
            label: self.label.clone(),
            access,
            bytes: size,
        });
        self.access = Some(access);
        Ok(&mut self.memory[..size])
    }

    fn stop_map(&mut self, _handle: RawHandle) -> Result<()> {
        let data = match self.access.take() {
            Some(access) if access.writes() => Some(self.memory.clone()),
            _ => None,
        };
        self.journal.borrow_mut().record(Op::Unmap {
            label: self.label.clone(),
            data,
        });
        Ok(())
    }
}

struct HeadlessShader {
    label: String,
    journal: Rc<RefCell<Journal>>,
}

impl ShaderBackend for HeadlessShader {
    fn compile(&mut self, _vertex: &str, _fragment: &str) -> Result<RawHandle> {
        let mut journal = self.journal.borrow_mut();
        journal.check(FailPoint::Compile, &self.label)?;
        journal.record(Op::Compile {
            label: self.label.clone(),
        });
        Ok(journal.handle())
    }

    fn destroy(&mut self, _handle: RawHandle) {
        self.journal.borrow_mut().record(Op::Destroy {
            label: self.label.clone(),
        });
    }

    fn bind(&mut self, _handle: RawHandle) -> Result<()> {
        self.journal.borrow_mut().record(Op::BindShader {
            label: self.label.clone(),
        });
        Ok(())
    }

    fn set_block(&mut self, _handle: RawHandle, name: &str, _buffer: RawHandle) -> Result<()> {
        self.journal.borrow_mut().record(Op::SetBlock {
            shader: self.label.clone(),
            name: name.to_string(),
        });
        Ok(())
    }

    fn set_texture(&mut self, _handle: RawHandle, name: &str, unit: u32, _texture: RawHandle) -> Result<()> {
        self.journal.borrow_mut().record(Op::SetTexture {
            shader: self.label.clone(),
            name: name.to_string(),
            unit,
        });
        Ok(())
    }

    fn draw(&mut self, _handle: RawHandle, call: &DrawCall) -> Result<()> {
        let mut journal = self.journal.borrow_mut();
        journal.check(FailPoint::Draw, &self.label)?;
        journal.record(Op::Draw {
            shader: self.label.clone(),
            streams: call.streams.len(),
            vertices: call.vertex_count,
            indices: call.index_count,
        });
        Ok(())
    }
}

struct HeadlessTarget {
    label: String,
    journal: Rc<RefCell<Journal>>,
}

impl TargetBackend for HeadlessTarget {
    fn create(&mut self, extent: Extent) -> Result<RawHandle> {
        let mut journal = self.journal.borrow_mut();
        journal.check(FailPoint::Create, &self.label)?;
        journal.record(Op::CreateTarget {
            label: self.label.clone(),
            width: extent.width,
            height: extent.height,
        });
        Ok(journal.handle())
    }

    fn destroy(&mut self, _handle: RawHandle) {
        self.journal.borrow_mut().record(Op::Destroy {
            label: self.label.clone(),
        });
    }

    fn bind(&mut self, _handle: RawHandle, _clear_color: [f32; 4]) -> Result<()> {
        self.journal.borrow_mut().record(Op::BindTarget {
            label: self.label.clone(),
        });
        Ok(())
    }
}
