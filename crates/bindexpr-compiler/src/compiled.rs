//! Compiled expressions and their artifact cache.
//!
//! A [`CompiledExpression`] wraps one syntax tree. It builds nothing up
//! front: each invocation computes the shape of its arguments (the runtime
//! type of every argument, or the declared parameter type for nulls) and
//! builds, lowers and caches an artifact the first time a shape is seen.

use std::sync::Arc;

use bindexpr_core::{AstNode, Metadata, RuntimeError, Type, TypeHash, Value};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::lower::{LoweredFn, lower};
use crate::pipeline::{ExpressionCompiler, ExpressionParameter};

/// Argument shape an artifact was built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Single(TypeHash),
    Multi(SmallVec<[TypeHash; 4]>),
}

impl CacheKey {
    fn of(types: &[Type]) -> Self {
        match types {
            [single] => CacheKey::Single(single.hash()),
            many => CacheKey::Multi(many.iter().map(Type::hash).collect()),
        }
    }
}

/// Executable code for one argument shape.
pub struct CompiledArtifact {
    func: LoweredFn,
    slot_count: usize,
    metadata_slot: usize,
    result_type: Type,
}

impl CompiledArtifact {
    pub fn result_type(&self) -> &Type {
        &self.result_type
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
}

impl std::fmt::Debug for CompiledArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledArtifact")
            .field("slot_count", &self.slot_count)
            .field("metadata_slot", &self.metadata_slot)
            .field("result_type", &self.result_type)
            .finish()
    }
}

/// A binding expression ready for repeated invocation.
///
/// # Thread Safety
///
/// Invocation takes `&mut self`: the frame and the artifact cache belong to
/// one caller at a time. Hosts that evaluate the same binding from several
/// threads keep one `CompiledExpression` per thread, or wrap it in a mutex.
/// Artifacts themselves are immutable and shared through `Arc`.
pub struct CompiledExpression {
    compiler: Arc<ExpressionCompiler>,
    ast: Arc<AstNode>,
    parameters: Vec<ExpressionParameter>,
    cache: FxHashMap<CacheKey, Arc<CompiledArtifact>>,
    frame: Vec<Value>,
    builds: usize,
}

impl CompiledExpression {
    pub fn new(
        compiler: Arc<ExpressionCompiler>,
        ast: Arc<AstNode>,
        parameters: Vec<ExpressionParameter>,
    ) -> Self {
        Self {
            compiler,
            ast,
            parameters,
            cache: FxHashMap::default(),
            frame: Vec::new(),
            builds: 0,
        }
    }

    pub fn ast(&self) -> &Arc<AstNode> {
        &self.ast
    }

    pub fn parameters(&self) -> &[ExpressionParameter] {
        &self.parameters
    }

    /// Number of cached artifacts.
    pub fn artifact_count(&self) -> usize {
        self.cache.len()
    }

    /// Number of successful builds since creation.
    pub fn build_count(&self) -> usize {
        self.builds
    }

    /// Drop every cached artifact.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Artifact for the shape of `args`, building it on first use.
    ///
    /// A failed build is returned as an error and leaves the cache
    /// untouched, so the next invocation with that shape tries again.
    pub fn artifact_for(
        &mut self,
        args: &[Value],
        metadata: &Metadata,
    ) -> Result<Arc<CompiledArtifact>, RuntimeError> {
        self.check_arity(args)?;
        let types: Vec<Type> = args
            .iter()
            .zip(&self.parameters)
            .map(|(arg, param)| arg.runtime_type().unwrap_or_else(|| param.ty.clone()))
            .collect();
        let key = CacheKey::of(&types);
        if let Some(artifact) = self.cache.get(&key) {
            return Ok(Arc::clone(artifact));
        }

        debug!(expression = %self.ast, shape = ?types.iter().map(Type::name).collect::<Vec<_>>(), "building artifact");
        let built = self
            .compiler
            .build(&self.ast, &self.parameters, &types, metadata)?;
        let artifact = Arc::new(CompiledArtifact {
            func: lower(&built.ir, built.metadata_slot),
            slot_count: built.slot_count,
            metadata_slot: built.metadata_slot,
            result_type: built.ir.ty,
        });
        self.builds += 1;
        self.cache.insert(key, Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Evaluate the expression for `args`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke(&mut self, args: &[Value], metadata: &Metadata) -> Result<Value, RuntimeError> {
        let artifact = self.artifact_for(args, metadata)?;

        self.frame.clear();
        self.frame.resize(artifact.slot_count, Value::Null);
        self.frame[..args.len()].clone_from_slice(args);
        self.frame[artifact.metadata_slot] = Value::Metadata(metadata.clone());

        let result = (artifact.func)(&mut self.frame);
        // Release argument references held by the frame
        self.frame.clear();
        result
    }

    fn check_arity(&self, args: &[Value]) -> Result<(), RuntimeError> {
        if args.len() == self.parameters.len() {
            Ok(())
        } else {
            Err(RuntimeError::ArgumentCount {
                expected: self.parameters.len(),
                actual: args.len(),
            })
        }
    }
}

impl std::fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("ast", &self.ast.to_string())
            .field("artifacts", &self.cache.len())
            .field("builds", &self.builds)
            .finish()
    }
}
