//! Overload resolution for methods and indexers.
//!
//! Resolution runs in two phases per candidate:
//!
//! 1. [`prepare`]: explicit type arguments, arity filter, and generic
//!    inference from the typed arguments.
//! 2. [`Prepared::finalize`]: once lambda arguments have been built against
//!    the candidate, check that every generic parameter is bound and its
//!    constraints hold, then score every argument.
//!
//! Static resolution ([`resolve_call`]) builds lambda arguments between the
//! two phases. Dynamic call sites ([`resolve_runtime`]) see only concrete
//! runtime types and go straight through.

mod inference;
mod ranking;

use std::sync::Arc;

use bindexpr_core::{
    AstNode, CompilationError, MemberDescriptor, SubstitutionMap, Type, TypeHash, Value,
};
use ordered_float::OrderedFloat;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::context::CompilationContext;
use crate::conversion::find_conversion;
use crate::ir::IrExpr;

pub use inference::unify;
pub use ranking::{Ambiguity, find_best};

// ============================================================================
// Argument shapes
// ============================================================================

/// What the resolver knows about one argument.
#[derive(Debug, Clone)]
pub enum ArgShape {
    Typed(Type),
    /// Lambda whose type depends on the candidate it is built against.
    Lambda { arity: usize },
}

/// A call argument as seen by static resolution. Lambda arguments have no
/// IR until a candidate supplies their expected signature.
#[derive(Debug)]
pub struct Argument<'a> {
    pub node: &'a AstNode,
    pub ir: Option<IrExpr>,
}

impl<'a> Argument<'a> {
    /// Build every non-lambda argument; lambdas are deferred.
    pub fn build_all(
        ctx: &mut CompilationContext<'a>,
        nodes: &'a [Arc<AstNode>],
    ) -> Result<Vec<Argument<'a>>, CompilationError> {
        nodes
            .iter()
            .map(|node| {
                let ir = match node.as_ref() {
                    AstNode::Lambda { .. } => None,
                    other => Some(ctx.build(other)?),
                };
                Ok(Argument {
                    node: node.as_ref(),
                    ir,
                })
            })
            .collect()
    }

    pub fn shape(&self) -> ArgShape {
        match (&self.ir, self.node) {
            (Some(ir), _) => ArgShape::Typed(ir.ty.clone()),
            (None, AstNode::Lambda { params, .. }) => ArgShape::Lambda {
                arity: params.len(),
            },
            (None, _) => ArgShape::Typed(Type::object()),
        }
    }

    pub fn is_lambda(&self) -> bool {
        self.ir.is_none()
    }
}

// ============================================================================
// Candidate scoring
// ============================================================================

/// Score of an applicable candidate.
#[derive(Debug, Clone)]
pub struct CandidateScore {
    /// The candidate with all generic parameters substituted.
    pub member: Arc<MemberDescriptor>,
    pub weight: OrderedFloat<f64>,
    /// Arguments matching their parameter type exactly.
    pub exact_count: usize,
    /// Trailing arguments are packed into the variadic array.
    pub uses_params: bool,
    /// The target is passed as the first argument.
    pub is_extension: bool,
    /// Effective argument count, receiver included for extensions.
    pub arg_count: usize,
}

/// Where each parameter of the selected member gets its value from.
#[derive(Debug, Clone)]
pub enum ArgSource {
    /// Effective argument at this position.
    Arg(usize),
    /// Omitted argument with a default value.
    Default(Value),
    /// Variadic tail: effective arguments from `start` packed into an array.
    Array { element: Type, start: usize },
}

/// One parameter of a call plan with its declared type.
#[derive(Debug, Clone)]
pub struct PlannedArg {
    pub source: ArgSource,
    pub ty: Type,
}

impl CandidateScore {
    /// Map parameters to argument sources.
    pub fn plan(&self) -> Vec<PlannedArg> {
        let params = &self.member.params;
        params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let source = if self.uses_params && param.is_params {
                    ArgSource::Array {
                        element: param.ty.element_type().cloned().unwrap_or_else(Type::object),
                        start: index,
                    }
                } else if index < self.arg_count {
                    ArgSource::Arg(index)
                } else {
                    ArgSource::Default(param.default.clone().unwrap_or_default())
                };
                PlannedArg {
                    source,
                    ty: param.ty.clone(),
                }
            })
            .collect()
    }
}

/// A candidate that passed the arity filter and typed-argument inference.
#[derive(Debug, Clone)]
pub struct Prepared {
    member: Arc<MemberDescriptor>,
    generics: FxHashSet<TypeHash>,
    map: SubstitutionMap,
    shapes: Vec<ArgShape>,
}

/// Phase one: explicit type arguments, arity and inference.
///
/// Extension candidates take `receiver` as an implicit first argument and
/// are rejected without one.
pub fn prepare(
    member: &Arc<MemberDescriptor>,
    receiver: Option<&Type>,
    args: &[ArgShape],
    explicit: &[Type],
) -> Option<Prepared> {
    let member = if explicit.is_empty() {
        Arc::clone(member)
    } else {
        match member.instantiate(explicit) {
            Some(closed) => Arc::new(closed),
            None => {
                trace!(member = %member.display_signature(), "rejected: type argument count");
                return None;
            }
        }
    };

    let mut shapes = Vec::with_capacity(args.len() + 1);
    if member.is_extension() {
        shapes.push(ArgShape::Typed(receiver?.clone()));
    }
    shapes.extend(args.iter().cloned());

    let n = shapes.len();
    if n < member.required_param_count()
        || (n > member.params.len() && !member.has_params_array())
    {
        trace!(member = %member.display_signature(), args = n, "rejected: arity");
        return None;
    }

    let generics: FxHashSet<TypeHash> = member.generic_params.iter().map(Type::hash).collect();
    let mut map = SubstitutionMap::default();
    if !generics.is_empty() {
        for (index, shape) in shapes.iter().enumerate() {
            let ArgShape::Typed(arg) = shape else {
                continue;
            };
            let Some(param) = slot_type(&member, index, Some(arg), n) else {
                continue;
            };
            if !unify(&param, arg, &generics, &mut map) {
                trace!(member = %member.display_signature(), "rejected: inference conflict");
                return None;
            }
        }
    }

    Some(Prepared {
        member,
        generics,
        map,
        shapes,
    })
}

/// Declared type of the parameter receiving effective argument `index`.
///
/// For the variadic slot this is the array type when a single array
/// argument fills it, otherwise the element type.
fn slot_type(member: &MemberDescriptor, index: usize, arg: Option<&Type>, n: usize) -> Option<Type> {
    let total = member.params.len();
    let last = total.checked_sub(1)?;
    let param = member.params.get(index.min(last))?;
    if param.is_params && index >= last {
        let fills_array = n == total && arg.is_some_and(|a| a.is_null() || a.element_type().is_some());
        if fills_array {
            return Some(param.ty.clone());
        }
        return param.ty.element_type().cloned();
    }
    Some(param.ty.clone())
}

impl Prepared {
    pub fn member(&self) -> &Arc<MemberDescriptor> {
        &self.member
    }

    /// Effective argument positions holding lambdas.
    pub fn lambda_positions(&self) -> Vec<usize> {
        self.shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, ArgShape::Lambda { .. }))
            .map(|(i, _)| i)
            .collect()
    }

    /// Offset of user arguments within the effective arguments.
    pub fn receiver_offset(&self) -> usize {
        usize::from(self.member.is_extension())
    }

    /// Delegate signature a lambda at `index` is built against.
    ///
    /// `None` when the slot is not a delegate of matching arity or when its
    /// parameter types are still unbound.
    pub fn lambda_signature(&self, index: usize) -> Option<Type> {
        let ArgShape::Lambda { arity } = self.shapes.get(index)? else {
            return None;
        };
        let expected = slot_type(&self.member, index, None, self.shapes.len())?.substitute(&self.map);
        let (params, _) = expected.delegate_signature()?;
        if params.len() != *arity || params.iter().any(Type::contains_generic_params) {
            return None;
        }
        Some(expected)
    }

    /// Feed the type of a built lambda back into inference.
    pub fn infer_lambda(&mut self, index: usize, lambda: &Type) -> bool {
        let Some(expected) = slot_type(&self.member, index, None, self.shapes.len()) else {
            return false;
        };
        unify(&expected, lambda, &self.generics, &mut self.map)
    }

    /// Phase two: close over inferred types and score every argument.
    pub fn finalize(self, lambda_types: &[(usize, Type)], extension_bias: f64) -> Option<CandidateScore> {
        for generic in &self.member.generic_params {
            let Some(bound) = self.map.get(&generic.hash()) else {
                trace!(member = %self.member.display_signature(), param = %generic, "rejected: unresolved generic");
                return None;
            };
            let constraints = &generic.as_generic_param()?.constraints;
            let base = constraints.base.as_ref().map(|b| b.substitute(&self.map));
            if !constraints.is_satisfied_by(bound, base.as_ref()) {
                trace!(member = %self.member.display_signature(), param = %generic, bound = %bound, "rejected: constraint");
                return None;
            }
        }

        let member = if self.member.is_generic() {
            Arc::new(self.member.substitute(&self.map))
        } else {
            self.member
        };

        let arg_types = self
            .shapes
            .iter()
            .enumerate()
            .map(|(index, shape)| match shape {
                ArgShape::Typed(ty) => Some(ty.clone()),
                ArgShape::Lambda { .. } => lambda_types
                    .iter()
                    .find(|(i, _)| *i == index)
                    .map(|(_, ty)| ty.clone()),
            })
            .collect::<Option<Vec<_>>>()?;

        score_arguments(member, &arg_types, extension_bias)
    }
}

fn score_arguments(
    member: Arc<MemberDescriptor>,
    arg_types: &[Type],
    extension_bias: f64,
) -> Option<CandidateScore> {
    let fixed_form = if arg_types.len() <= member.params.len() {
        score_form(&member, arg_types, false)
    } else {
        None
    };
    let expanded_form = if member.has_params_array() {
        score_form(&member, arg_types, true)
    } else {
        None
    };
    // The fixed form wins ties: an array passed straight to the variadic slot
    let (weight, exact_count, uses_params) = match (fixed_form, expanded_form) {
        (Some(fixed), Some(expanded)) if expanded.0 < fixed.0 => (expanded.0, expanded.1, true),
        (Some((weight, exact)), _) => (weight, exact, false),
        (None, Some((weight, exact))) => (weight, exact, true),
        (None, None) => {
            trace!(member = %member.display_signature(), "rejected: argument types");
            return None;
        }
    };

    let is_extension = member.is_extension();
    let weight = if is_extension {
        weight + extension_bias
    } else {
        weight
    };
    Some(CandidateScore {
        member,
        weight: OrderedFloat(weight),
        exact_count,
        uses_params,
        is_extension,
        arg_count: arg_types.len(),
    })
}

/// Weight and exact-match count for one calling form.
fn score_form(member: &MemberDescriptor, args: &[Type], expanded: bool) -> Option<(f64, usize)> {
    let params = &member.params;
    let fixed = if expanded { params.len().checked_sub(1)? } else { params.len() };

    let mut weight = 0.0;
    let mut exact = 0;
    for (arg, param) in args.iter().zip(&params[..fixed]) {
        let conv = find_conversion(arg, &param.ty)?;
        weight += conv.weight;
        exact += usize::from(conv.is_exact());
    }

    // Omitted fixed parameters need defaults
    if params[..fixed].iter().skip(args.len()).any(|p| !p.has_default()) {
        return None;
    }

    if expanded {
        let element = params[fixed].ty.element_type()?;
        let mut tail = 0.0_f64;
        for arg in args.iter().skip(fixed) {
            let conv = find_conversion(arg, element)?;
            tail = tail.max(conv.weight);
            exact += usize::from(conv.is_exact());
        }
        weight += tail;
    }
    Some((weight, exact))
}

// ============================================================================
// Resolution
// ============================================================================

/// Statically resolved call.
#[derive(Debug)]
pub struct Resolution {
    pub score: CandidateScore,
    /// Lambda arguments built against the winner, by effective position.
    pub lambdas: Vec<(usize, IrExpr)>,
}

/// Resolve a call among `candidates` at compile time.
///
/// Lambda arguments are built once per surviving candidate with that
/// candidate's delegate signature as the expected signature. A lambda body
/// that does not fit rejects only that candidate; terminal errors such as
/// an unknown type name end the resolution.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn resolve_call<'a>(
    ctx: &mut CompilationContext<'a>,
    name: &str,
    candidates: &[Arc<MemberDescriptor>],
    receiver: Option<&Type>,
    args: &[Argument<'a>],
    explicit: &[Type],
) -> Result<Option<Resolution>, CompilationError> {
    let shapes: Vec<ArgShape> = args.iter().map(Argument::shape).collect();
    let has_lambda = args.iter().any(Argument::is_lambda);
    let bias = ctx.options().extension_bias;

    let mut scored = Vec::new();
    'candidates: for candidate in candidates {
        let Some(mut prepared) = prepare(candidate, receiver, &shapes, explicit) else {
            continue;
        };

        let mut lambdas = Vec::new();
        for index in prepared.lambda_positions() {
            let Some(signature) = prepared.lambda_signature(index) else {
                trace!(member = %candidate.display_signature(), "rejected: lambda signature");
                continue 'candidates;
            };
            let node = args[index - prepared.receiver_offset()].node;
            let built = {
                let mut scope = ctx.expect_lambda(signature);
                scope.build(node)
            };
            let ir = match built {
                Ok(ir) => ir,
                Err(err) if err.is_candidate_mismatch() => {
                    trace!(member = %candidate.display_signature(), error = %err, "rejected: lambda body");
                    continue 'candidates;
                }
                Err(err) => return Err(err),
            };
            if !prepared.infer_lambda(index, &ir.ty) {
                trace!(member = %candidate.display_signature(), "rejected: lambda return type");
                continue 'candidates;
            }
            lambdas.push((index, ir));
        }

        let lambda_types: Vec<(usize, Type)> =
            lambdas.iter().map(|(i, ir)| (*i, ir.ty.clone())).collect();
        if let Some(score) = prepared.finalize(&lambda_types, bias) {
            scored.push((score, lambdas));
        }
    }

    match find_best(scored, has_lambda) {
        Ok(Some((score, lambdas))) => {
            debug!(
                name,
                member = %score.member.display_signature(),
                weight = score.weight.0,
                "overload selected"
            );
            Ok(Some(Resolution { score, lambdas }))
        }
        Ok(None) => Ok(None),
        Err(ambiguity) => Err(CompilationError::AmbiguousOverload {
            name: name.to_string(),
            candidates: ambiguity.describe(),
        }),
    }
}

/// Resolve a call among `candidates` against concrete runtime types.
pub fn resolve_runtime(
    candidates: &[Arc<MemberDescriptor>],
    receiver: Option<&Type>,
    arg_types: &[Type],
    explicit: &[Type],
    extension_bias: f64,
) -> Result<Option<CandidateScore>, Ambiguity> {
    let shapes: Vec<ArgShape> = arg_types.iter().cloned().map(ArgShape::Typed).collect();
    let scored: Vec<(CandidateScore, ())> = candidates
        .iter()
        .filter_map(|candidate| prepare(candidate, receiver, &shapes, explicit))
        .filter_map(|prepared| prepared.finalize(&[], extension_bias))
        .map(|score| (score, ()))
        .collect();
    Ok(find_best(scored, false)?.map(|(score, ())| score))
}
