//! Per-context shader program cache

use crate::device::{ContextId, GpuContext};
use meshview_core::{Error, Result};
use std::collections::HashMap;

/// What to draw when a custom program fails to compile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderFallback {
    /// Draw the item with the default shading
    #[default]
    DefaultShading,
    /// Leave the item out of the frame
    SkipItem,
}

impl std::str::FromStr for ShaderFallback {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(ShaderFallback::DefaultShading),
            "skip" => Ok(ShaderFallback::SkipItem),
            other => Err(Error::InvalidData(format!("unknown shader fallback '{}'", other))),
        }
    }
}

/// Compiles shader programs for one device context at a time
pub trait ShaderDevice {
    type Program;

    fn context_id(&self) -> ContextId;

    fn compile(&mut self, label: &str, source: &str) -> Result<Self::Program>;
}

/// Outcome of compiling for a context
#[derive(Debug)]
pub enum ProgramState<P> {
    Compiled(P),
    Failed,
}

/// Compiled programs keyed by context
///
/// Each context compiles at most once; a failed compile is remembered until
/// the context is invalidated.
pub struct ShaderProgramCache<P> {
    label: String,
    source: String,
    programs: HashMap<ContextId, ProgramState<P>>,
}

impl<P> ShaderProgramCache<P> {
    pub fn new(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
            programs: HashMap::new(),
        }
    }

    /// Program for the device's current context, compiling on first use
    pub fn get_or_compile<D>(&mut self, device: &mut D) -> Option<&P>
    where
        D: ShaderDevice<Program = P>,
    {
        let context = device.context_id();
        let label = self.label.as_str();
        let source = self.source.as_str();
        let state = self.programs.entry(context).or_insert_with(|| {
            match device.compile(label, source) {
                Ok(program) => {
                    log::debug!("compiled '{}' for {}", label, context);
                    ProgramState::Compiled(program)
                }
                Err(e) => {
                    log::error!("'{}' failed to compile for {}: {}", label, context, e);
                    ProgramState::Failed
                }
            }
        });
        match state {
            ProgramState::Compiled(program) => Some(program),
            ProgramState::Failed => None,
        }
    }

    pub fn state(&self, context: ContextId) -> Option<&ProgramState<P>> {
        self.programs.get(&context)
    }

    /// Forget the program of a context that went away
    pub fn invalidate(&mut self, context: ContextId) -> Option<P> {
        match self.programs.remove(&context)? {
            ProgramState::Compiled(program) => Some(program),
            ProgramState::Failed => None,
        }
    }
}

impl ShaderDevice for GpuContext {
    type Program = wgpu::ShaderModule;

    fn context_id(&self) -> ContextId {
        self.id
    }

    fn compile(&mut self, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.create_shader_module(label, source);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(Error::Gpu(error.to_string())),
            None => Ok(module),
        }
    }
}
