//! End-to-end tests: syntax trees compiled against a small host object model
//! and invoked through `CompiledExpression`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bindexpr::prelude::*;
use bindexpr_compiler::{IrExpr, IrKind};

struct PersonData {
    name: String,
    friend: Option<Value>,
}

struct World {
    compiler: Arc<ExpressionCompiler>,
    person: Type,
    animal: Type,
    list: Type,
    touches: Arc<AtomicUsize>,
}

fn person_data(target: Option<&Value>) -> Result<&PersonData, RuntimeError> {
    target
        .and_then(|t| t.downcast_ref::<PersonData>())
        .ok_or_else(|| RuntimeError::native("not a person"))
}

fn list_items(value: &Value) -> Result<&Vec<Value>, RuntimeError> {
    value
        .downcast_ref::<Vec<Value>>()
        .ok_or_else(|| RuntimeError::native("not a list"))
}

fn call_delegate(value: &Value, arg: Value) -> Result<Value, RuntimeError> {
    value
        .as_delegate()
        .ok_or_else(|| RuntimeError::native("not a delegate"))?
        .invoke(&[arg])
}

/// Route build and cache traces to the test output (`RUST_LOG=bindexpr_compiler=trace`).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn world_with(options: CompilerOptions) -> World {
    init_tracing();
    let mut registry = MemberRegistry::new();
    let touches = Arc::new(AtomicUsize::new(0));

    let animal = TypeBuilder::class("Animal").build();
    let dog = TypeBuilder::class("Dog").base(animal.clone()).sealed().build();
    let person = TypeBuilder::class("Person").build();
    let calc = TypeBuilder::class("Calc").sealed().build();
    let item = Type::generic_param("List.T", 0, GenericConstraints::none());
    let list = TypeBuilder::class("List").generic_params(vec![item]).build();
    for ty in [&animal, &dog, &person, &calc, &list] {
        registry.register_type(ty.clone());
    }

    registry.register_member(
        MemberDescriptor::property("Length", Type::string(), Type::int())
            .native(|target, _, _| {
                let s = target.and_then(Value::as_str).unwrap_or_default();
                Ok(Value::Int(s.chars().count() as i32))
            })
            .build(),
    );

    registry.register_member(
        MemberDescriptor::property("Name", person.clone(), Type::string())
            .native(|target, _, _| Ok(Value::str(&person_data(target)?.name)))
            .build(),
    );
    registry.register_member(
        MemberDescriptor::property("Friend", person.clone(), person.clone())
            .native(|target, _, _| Ok(person_data(target)?.friend.clone().unwrap_or(Value::Null)))
            .build(),
    );
    let counter = Arc::clone(&touches);
    registry.register_member(
        MemberDescriptor::method("Touch", person.clone(), person.clone())
            .native(move |target, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(target.cloned().unwrap_or(Value::Null))
            })
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("Greeting", person.clone(), Type::string())
            .param(Param::with_default("punctuation", Type::string(), "!"))
            .native(|target, args, metadata| {
                let salutation = metadata
                    .get("salutation")
                    .and_then(Value::as_str)
                    .unwrap_or("Hi");
                let punctuation = args[0].as_str().unwrap_or_default();
                Ok(Value::str(format!(
                    "{salutation} {}{punctuation}",
                    person_data(target)?.name
                )))
            })
            .build(),
    );
    let dog_for_pet = dog.clone();
    registry.register_member(
        MemberDescriptor::property("Pet", person.clone(), animal.clone())
            .native(move |_, _, _| Ok(Value::object(dog_for_pet.clone(), ())))
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("Bark", dog.clone(), Type::string())
            .native(|_, _, _| Ok(Value::str("woof")))
            .build(),
    );
    registry.register_member(
        MemberDescriptor::property("Age", person.clone(), Type::int())
            .descriptor(|_, _, _| Ok(Value::Int(36)))
            .build(),
    );

    registry.register_member(
        MemberDescriptor::method("F", calc.clone(), Type::string())
            .param(Param::new("value", Type::int()))
            .static_member()
            .native(|_, _, _| Ok(Value::str("int")))
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("F", calc.clone(), Type::string())
            .param(Param::new("value", Type::object()))
            .static_member()
            .native(|_, _, _| Ok(Value::str("object")))
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("Sum", calc.clone(), Type::int())
            .params([
                Param::new("first", Type::int()),
                Param::params("rest", &Type::int()),
            ])
            .static_member()
            .native(|_, args, _| {
                let rest = args[1]
                    .as_array()
                    .ok_or_else(|| RuntimeError::native("rest is not an array"))?;
                let total = rest
                    .items()
                    .iter()
                    .filter_map(Value::as_int)
                    .fold(args[0].as_int().unwrap_or(0), |acc, v| acc + v);
                Ok(Value::Int(total))
            })
            .build(),
    );
    let first_t = Type::generic_param("Calc.First.T", 0, GenericConstraints::none());
    let list_of_first = list.instantiate(&[first_t.clone()]).unwrap();
    registry.register_member(
        MemberDescriptor::method("First", calc.clone(), first_t.clone())
            .generic_params(vec![first_t])
            .param(Param::new("source", list_of_first))
            .static_member()
            .native(|_, args, _| Ok(list_items(&args[0])?.first().cloned().unwrap_or(Value::Null)))
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("Apply", calc.clone(), Type::int())
            .param(Param::new("f", Type::delegate(vec![Type::int()], Type::int())))
            .static_member()
            .native(|_, args, _| call_delegate(&args[0], Value::Int(2)))
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("Apply", calc.clone(), Type::int())
            .param(Param::new("f", Type::delegate(vec![Type::string()], Type::int())))
            .static_member()
            .native(|_, args, _| call_delegate(&args[0], Value::str("hello")))
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("Combine", calc.clone(), Type::string())
            .params([
                Param::new("count", Type::int()),
                Param::new("scale", Type::double()),
            ])
            .static_member()
            .native(|_, args, _| {
                let count = args[0].as_int().unwrap_or_default();
                let scale = args[1].as_double().unwrap_or_default();
                Ok(Value::str(format!("{count}/{scale}")))
            })
            .build(),
    );
    for target in [Type::string(), person.clone()] {
        registry.register_member(
            MemberDescriptor::method("Pick", calc.clone(), Type::int())
                .param(Param::new("value", target))
                .static_member()
                .native(|_, _, _| Ok(Value::Int(0)))
                .build(),
        );
    }

    // Descriptor-only members: bound late through a call site
    registry.register_member(
        MemberDescriptor::method("Total", calc.clone(), Type::int())
            .params([
                Param::new("first", Type::int()),
                Param::params("rest", &Type::int()),
            ])
            .static_member()
            .descriptor(|target, args, _| {
                if target.is_some() {
                    return Err(RuntimeError::native("static member received a target"));
                }
                let rest = args[1]
                    .as_array()
                    .ok_or_else(|| RuntimeError::native("rest is not an array"))?;
                let total = rest
                    .items()
                    .iter()
                    .filter_map(Value::as_int)
                    .fold(args[0].as_int().unwrap_or(0), |acc, v| acc + v);
                Ok(Value::Int(total))
            })
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("Scale", calc.clone(), Type::int())
            .params([
                Param::new("value", Type::int()),
                Param::with_default("factor", Type::int(), 2),
            ])
            .static_member()
            .descriptor(|_, args, _| {
                let value = args[0].as_int().unwrap_or_default();
                let factor = args
                    .get(1)
                    .and_then(Value::as_int)
                    .ok_or_else(|| RuntimeError::native("factor was not supplied"))?;
                Ok(Value::Int(value * factor))
            })
            .build(),
    );
    registry.register_member(
        MemberDescriptor::method("Shout", Type::object(), Type::string())
            .params([
                Param::new("person", person.clone()),
                Param::with_default("times", Type::int(), 2),
            ])
            .extension()
            .descriptor(|target, args, _| {
                if target.is_some() {
                    return Err(RuntimeError::native("extension received a target"));
                }
                let times = args.get(1).and_then(Value::as_int).unwrap_or_default();
                let name = &person_data(args.first())?.name;
                Ok(Value::str(format!("{name}{}", "!".repeat(times.max(0) as usize))))
            })
            .build(),
    );

    let source = Type::generic_param("Select.S", 0, GenericConstraints::none());
    let result = Type::generic_param("Select.R", 1, GenericConstraints::none());
    let list_def = list.clone();
    registry.register_member(
        MemberDescriptor::method("Select", Type::object(), list.instantiate(&[result.clone()]).unwrap())
            .generic_params(vec![source.clone(), result.clone()])
            .params([
                Param::new("source", list.instantiate(&[source.clone()]).unwrap()),
                Param::new("selector", Type::delegate(vec![source], result)),
            ])
            .extension()
            .native(move |_, args, _| {
                let selector = args[1]
                    .as_delegate()
                    .ok_or_else(|| RuntimeError::native("selector is not a delegate"))?;
                let element = selector
                    .ty()
                    .delegate_signature()
                    .map(|(_, ret)| ret.clone())
                    .unwrap_or_else(Type::object);
                let items = list_items(&args[0])?
                    .iter()
                    .map(|item| selector.invoke(std::slice::from_ref(item)))
                    .collect::<Result<Vec<_>, _>>()?;
                let ty = list_def
                    .instantiate(&[element])
                    .ok_or_else(|| RuntimeError::native("cannot instantiate list"))?;
                Ok(Value::object(ty, items))
            })
            .build(),
    );

    World {
        compiler: Arc::new(ExpressionCompiler::with_options(Arc::new(registry), options)),
        person,
        animal,
        list,
        touches,
    }
}

fn world() -> World {
    world_with(CompilerOptions::default())
}

impl World {
    fn person(&self, name: &str, friend: Option<Value>) -> Value {
        Value::object(
            self.person.clone(),
            PersonData {
                name: name.to_string(),
                friend,
            },
        )
    }

    fn strings(&self, items: &[&str]) -> Value {
        let ty = self.list.instantiate(&[Type::string()]).unwrap();
        Value::object(ty, items.iter().map(|s| Value::str(s)).collect::<Vec<_>>())
    }

    fn single(&self, ast: Arc<AstNode>) -> CompiledExpression {
        self.compiler
            .compile(ast, vec![ExpressionParameter::new(0, "x", Type::object())])
    }

    fn build(&self, ast: &AstNode, arg_types: &[Type]) -> Result<IrExpr, CompilationError> {
        let params: Vec<_> = arg_types
            .iter()
            .enumerate()
            .map(|(i, _)| ExpressionParameter::new(i, format!("p{i}"), Type::object()))
            .collect();
        self.compiler
            .build(ast, &params, arg_types, &Metadata::new())
            .map(|built| built.ir)
    }
}

fn calc(name: &str, args: Vec<Arc<AstNode>>) -> Arc<AstNode> {
    AstNode::call(AstNode::type_access("Calc"), name, args)
}

/// The call-site node under the conversion to the member's declared type.
fn late_bound(ir: &IrExpr) -> &IrExpr {
    match &ir.kind {
        IrKind::Convert(inner) => late_bound(inner),
        _ => ir,
    }
}

#[test]
fn exact_match_beats_implicit_conversion() {
    let w = world();
    let mut expr = w.single(calc("F", vec![AstNode::parameter(0, "x")]));
    let metadata = Metadata::new();
    assert_eq!(expr.invoke(&[Value::Int(7)], &metadata).unwrap(), Value::str("int"));
    assert_eq!(expr.invoke(&[Value::str("s")], &metadata).unwrap(), Value::str("object"));
}

#[test]
fn params_tail_is_packed_into_one_array() {
    let w = world();
    let ast = calc(
        "Sum",
        vec![
            AstNode::constant(1),
            AstNode::constant(2),
            AstNode::constant(3),
            AstNode::constant(4),
        ],
    );
    let ir = w.build(&ast, &[]).unwrap();
    let IrKind::Call { args, .. } = &ir.kind else {
        panic!("expected call, got {ir:?}");
    };
    assert_eq!(args.len(), 2);
    let IrKind::NewArray { element, items } = &args[1].kind else {
        panic!("expected array, got {:?}", args[1]);
    };
    assert_eq!(element, &Type::int());
    assert_eq!(items.len(), 3);

    let mut expr = w.compiler.compile(ast, Vec::new());
    assert_eq!(expr.invoke(&[], &Metadata::new()).unwrap(), Value::Int(10));
}

#[test]
fn generic_argument_is_inferred_from_instantiation() {
    let w = world();
    let ast = calc("First", vec![AstNode::parameter(0, "p0")]);
    let list_of_string = w.list.instantiate(&[Type::string()]).unwrap();
    let ir = w.build(&ast, &[list_of_string]).unwrap();
    assert_eq!(ir.ty, Type::string());

    let mut expr = w.single(calc("First", vec![AstNode::parameter(0, "x")]));
    let names = w.strings(&["Ada", "Grace"]);
    assert_eq!(expr.invoke(&[names], &Metadata::new()).unwrap(), Value::str("Ada"));
}

#[test]
fn explicit_type_arguments_are_honored() {
    let w = world();
    let ast = AstNode::call_generic(
        AstNode::type_access("Calc"),
        "First",
        vec!["string".to_string()],
        vec![AstNode::parameter(0, "p0")],
    );
    let list_of_string = w.list.instantiate(&[Type::string()]).unwrap();
    assert_eq!(w.build(&ast, &[list_of_string]).unwrap().ty, Type::string());
}

#[test]
fn extension_lambda_infers_result_type() {
    let w = world();
    let ast = AstNode::call(
        AstNode::parameter(0, "x"),
        "Select",
        vec![AstNode::lambda(
            &["n"],
            AstNode::member(AstNode::parameter(0, "n"), "Length"),
        )],
    );
    let list_of_string = w.list.instantiate(&[Type::string()]).unwrap();
    let list_of_int = w.list.instantiate(&[Type::int()]).unwrap();
    assert_eq!(w.build(&ast, &[list_of_string]).unwrap().ty, list_of_int);

    let mut expr = w.single(ast);
    let result = expr
        .invoke(&[w.strings(&["Ada", "Grace"])], &Metadata::new())
        .unwrap();
    assert_eq!(result.runtime_type(), Some(list_of_int));
    assert_eq!(
        list_items(&result).unwrap(),
        &vec![Value::Int(3), Value::Int(5)]
    );
}

#[test]
fn artifacts_are_built_once_per_shape() {
    let w = world();
    let mut expr = w.single(AstNode::member(AstNode::parameter(0, "x"), "Name"));
    let metadata = Metadata::new();
    let ada = w.person("Ada", None);

    let first = expr.artifact_for(&[ada.clone()], &metadata).unwrap();
    let second = expr.artifact_for(&[w.person("Grace", None)], &metadata).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(expr.build_count(), 1);

    assert_eq!(expr.invoke(&[ada], &metadata).unwrap(), Value::str("Ada"));
    assert_eq!(expr.build_count(), 1);
    assert_eq!(expr.artifact_count(), 1);
}

#[test]
fn null_conditional_root_is_evaluated_once() {
    let w = world();
    // x.Touch()?.Friend?.Name
    let touched = AstNode::null_conditional(AstNode::call(AstNode::parameter(0, "x"), "Touch", vec![]));
    let friend = AstNode::null_conditional(AstNode::member(touched, "Friend"));
    let mut expr = w.single(AstNode::member(friend, "Name"));
    let metadata = Metadata::new();

    let bob = w.person("Bob", None);
    let ada = w.person("Ada", Some(bob.clone()));
    assert_eq!(expr.invoke(&[ada], &metadata).unwrap(), Value::str("Bob"));
    assert_eq!(w.touches.load(Ordering::SeqCst), 1);

    assert_eq!(expr.invoke(&[bob], &metadata).unwrap(), Value::Null);
    assert_eq!(w.touches.load(Ordering::SeqCst), 2);
}

#[test]
fn null_conditional_short_circuits_null_arguments() {
    let w = world();
    let ast = AstNode::member(AstNode::null_conditional(AstNode::parameter(0, "p")), "Name");
    let mut expr = w
        .compiler
        .compile(ast, vec![ExpressionParameter::new(0, "p", w.person.clone())]);
    assert_eq!(expr.invoke(&[Value::Null], &Metadata::new()).unwrap(), Value::Null);
}

#[test]
fn failed_lambda_trials_leave_no_bindings_behind() {
    let w = world();
    // Calc.Combine(Calc.Apply(x => x.Length), x): the lambda parameter
    // shadows the outer `x` only inside the lambda body
    let apply = calc(
        "Apply",
        vec![AstNode::lambda(
            &["x"],
            AstNode::member(AstNode::parameter(0, "x"), "Length"),
        )],
    );
    let ast = calc("Combine", vec![apply, AstNode::parameter(0, "x")]);
    let mut expr = w
        .compiler
        .compile(ast, vec![ExpressionParameter::new(0, "x", Type::double())]);
    assert_eq!(
        expr.invoke(&[Value::Double(1.5)], &Metadata::new()).unwrap(),
        Value::str("5/1.5")
    );
}

#[test]
fn equally_unchecked_overloads_are_ambiguous() {
    let w = world();
    let ast = calc("Pick", vec![AstNode::parameter(0, "p0")]);
    let err = w.build(&ast, &[w.animal.clone()]).unwrap_err();
    assert!(
        matches!(&err, CompilationError::AmbiguousOverload { name, .. } if name == "Pick"),
        "unexpected error: {err:?}"
    );
}

#[test]
fn unsealed_members_resolve_at_runtime() {
    let w = world();
    let ast = AstNode::call(AstNode::member(AstNode::parameter(0, "x"), "Pet"), "Bark", vec![]);
    let ir = w.build(&ast, &[w.person.clone()]).unwrap();
    assert!(matches!(ir.kind, IrKind::Dynamic { .. }), "expected dynamic, got {ir:?}");

    let mut expr = w.single(ast);
    assert_eq!(
        expr.invoke(&[w.person("Ada", None)], &Metadata::new()).unwrap(),
        Value::str("woof")
    );
}

#[test]
fn disabled_fallback_reports_the_static_type() {
    let w = world_with(CompilerOptions::default().with_dynamic_fallback(false));
    let ast = AstNode::call(AstNode::member(AstNode::parameter(0, "x"), "Pet"), "Bark", vec![]);
    let err = w.build(&ast, &[w.person.clone()]).unwrap_err();
    assert_eq!(
        err,
        CompilationError::InvalidBindingMember {
            member: "Bark".to_string(),
            ty: w.animal.name().to_string(),
        }
    );
}

#[test]
fn metadata_and_defaults_reach_native_members() {
    let w = world();
    let mut expr = w.single(AstNode::call(AstNode::parameter(0, "x"), "Greeting", vec![]));
    let metadata = Metadata::new().with("salutation", "Hello");
    assert_eq!(
        expr.invoke(&[w.person("Ada", None)], &metadata).unwrap(),
        Value::str("Hello Ada!")
    );
}

#[test]
fn descriptor_members_are_invoked_late() {
    let w = world();
    let ast = AstNode::binary(
        BinaryOp::Add,
        AstNode::member(AstNode::parameter(0, "x"), "Age"),
        AstNode::constant(1),
    );
    let mut expr = w.single(ast);
    assert_eq!(
        expr.invoke(&[w.person("Ada", None)], &Metadata::new()).unwrap(),
        Value::Int(37)
    );
}

#[test]
fn descriptor_params_tail_is_packed_at_the_call_site() {
    let w = world();
    let ast = calc("Total", (1..=4i32).map(AstNode::constant).collect());
    let ir = w.build(&ast, &[]).unwrap();
    assert_eq!(ir.ty, Type::int());
    match &late_bound(&ir).kind {
        IrKind::Dynamic { target, args, .. } => {
            assert!(target.is_none());
            assert_eq!(args.len(), 4);
        }
        _ => panic!("expected a late-bound call, got {ir:?}"),
    }

    let mut expr = w.compiler.compile(ast, Vec::new());
    assert_eq!(expr.invoke(&[], &Metadata::new()).unwrap(), Value::Int(10));
}

#[test]
fn descriptor_defaults_are_filled_at_the_call_site() {
    let w = world();
    let ast = calc("Scale", vec![AstNode::constant(4)]);
    let ir = w.build(&ast, &[]).unwrap();
    assert!(
        matches!(&late_bound(&ir).kind, IrKind::Dynamic { args, .. } if args.len() == 1),
        "expected a late-bound call, got {ir:?}"
    );

    let mut expr = w.compiler.compile(ast, Vec::new());
    assert_eq!(expr.invoke(&[], &Metadata::new()).unwrap(), Value::Int(8));

    let explicit = calc("Scale", vec![AstNode::constant(4), AstNode::constant(3)]);
    let mut expr = w.compiler.compile(explicit, Vec::new());
    assert_eq!(expr.invoke(&[], &Metadata::new()).unwrap(), Value::Int(12));
}

#[test]
fn descriptor_extensions_receive_the_target_as_first_argument() {
    let w = world();
    let ast = AstNode::call(AstNode::parameter(0, "x"), "Shout", vec![]);
    let ir = w.build(&ast, &[w.person.clone()]).unwrap();
    assert_eq!(ir.ty, Type::string());
    match &late_bound(&ir).kind {
        IrKind::Dynamic { target, args, .. } => {
            assert!(target.is_some());
            assert!(args.is_empty());
        }
        _ => panic!("expected a late-bound call, got {ir:?}"),
    }

    let mut expr = w.single(ast);
    assert_eq!(
        expr.invoke(&[w.person("Ada", None)], &Metadata::new()).unwrap(),
        Value::str("Ada!!")
    );
}

#[test]
fn unresolvable_types_in_lambda_bodies_fail_the_call() {
    let w = world();
    // Calc.Apply(x => Nope.Zero): no Apply overload can rescue the body
    let ast = calc(
        "Apply",
        vec![AstNode::lambda(
            &["x"],
            AstNode::member(AstNode::type_access("Nope"), "Zero"),
        )],
    );
    let err = w.build(&ast, &[]).unwrap_err();
    assert_eq!(
        err,
        CompilationError::CannotResolveType {
            name: "Nope".to_string()
        }
    );
}

#[test]
fn unknown_static_type_is_a_compilation_error() {
    let w = world();
    let ast = AstNode::call(AstNode::type_access("Nope"), "F", vec![]);
    let mut expr = w.compiler.compile(ast, Vec::new());
    let err = expr.invoke(&[], &Metadata::new()).unwrap_err();
    assert!(
        matches!(
            &err,
            RuntimeError::Compilation(CompilationError::CannotResolveType { .. })
        ),
        "unexpected error: {err:?}"
    );
}
