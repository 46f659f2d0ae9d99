//! User classes: class-level and instance-level dispatch, construction,
//! the special hooks, and class copies.

use lalang::{CollectBytesPrint, ErrorKind, NoPrint, Object, Vm};
use pretty_assertions::assert_eq;

fn run(source: &str) -> Vm {
    let mut vm = Vm::with_writer(Box::new(NoPrint));
    vm.eval_text(source.as_bytes(), "<test>").expect("evaluation failed");
    vm
}

fn top(source: &str) -> Object {
    run(source).top_object().expect("empty stack")
}

fn fails(source: &str) -> ErrorKind {
    let mut vm = Vm::with_writer(Box::new(NoPrint));
    vm.eval_text(source.as_bytes(), "<test>")
        .expect_err("expected an error")
        .kind()
}

#[test]
fn class_attributes_default_through_the_class_setter() {
    assert_eq!(top(r#""A" @class =A 5 A =.v A .v"#), Object::Int(5));
}

#[test]
fn instances_start_with_a_fresh_empty_dict() {
    assert_eq!(top(r#""A" @class =A A @ .__dict__ .len"#), Object::Int(0));
    // Two instances do not share attribute storage.
    let source = r#"
        "A" @class =A
        A @ =a A @ =b
        1 a =.x
        b .__dict__ .len
    "#;
    assert_eq!(top(source), Object::Int(0));
}

#[test]
fn typeof_an_instance_is_its_class() {
    assert_eq!(top(r#""A" @class =A A @ @typeof A @is"#), Object::Bool(true));
    assert_eq!(top(r#""A" @class =A A @typeof type @is"#), Object::Bool(true));
}

#[test]
fn init_runs_with_the_new_instance_on_top() {
    let source = r#"
        "Box" @class =Box
        [ =self 42 self =.x self ] $__init__ Box .set_getter
        Box @ .x
    "#;
    assert_eq!(top(source), Object::Int(42));
}

#[test]
fn init_consumes_constructor_arguments() {
    let source = r#"
        "V" @class =V
        [ =self =v v self =.v self ] $__init__ V .set_getter
        7 V @ .v
    "#;
    assert_eq!(top(source), Object::Int(7));
}

#[test]
fn methods_installed_with_set_getter_see_the_instance() {
    let source = r#"
        "Counter" @class =Counter
        [ =self 0 self =.n self ] $__init__ Counter .set_getter
        [ =self self .n 1 + self =.n ] $bump Counter .set_getter
        Counter @ =c
        c .bump c .bump
        c .n
    "#;
    assert_eq!(top(source), Object::Int(2));
}

#[test]
fn class_getters_run_with_the_class_on_top() {
    let source = r#"
        "A" @class =A
        [ =cls 99 ] $answer A .set_class_getter
        A .answer
    "#;
    assert_eq!(top(source), Object::Int(99));
}

#[test]
fn instance_setters_intercept_attribute_writes() {
    let source = r#"
        "A" @class =A
        [ =self 2 * "x" self .__dict__ .set ] $x A .set_setter
        A @ =a
        21 a =.x
        a .x
    "#;
    assert_eq!(top(source), Object::Int(42));
}

#[test]
fn class_setters_intercept_class_writes() {
    let source = r#"
        "A" @class =A
        [ =cls 1 + "v" cls .__dict__ .set ] $v A .set_class_setter
        10 A =.v
        A .v
    "#;
    assert_eq!(top(source), Object::Int(11));
}

#[test]
fn instance_lookup_falls_back_to_class_attrs() {
    let source = r#"
        "A" @class =A
        5 A =.shared
        A @ .shared
    "#;
    assert_eq!(top(source), Object::Int(5));
}

#[test]
fn own_attrs_shadow_class_attrs() {
    let source = r#"
        "A" @class =A
        5 A =.v
        A @ =a
        9 a =.v
        a .v A .v
    "#;
    let vm = run(source);
    assert_eq!(vm.stack_objects(), vec![Object::Int(9), Object::Int(5)]);
}

#[test]
fn missing_attributes_are_fatal() {
    assert_eq!(fails(r#""A" @class =A A .missing"#), ErrorKind::Name);
    assert_eq!(fails(r#""A" @class =A A @ .missing"#), ErrorKind::Name);
}

#[test]
fn cmp_hook_gives_ordering() {
    let source = r#"
        "V" @class =V
        [ =self =v v self =.v self ] $__init__ V .set_getter
        [ =other =self self .v other .v - ] $__cmp__ V .set_getter
    "#;
    assert_eq!(top(&format!("{source} 1 V @ 2 V @ <")), Object::Bool(true));
    assert_eq!(top(&format!("{source} 2 V @ 1 V @ >")), Object::Bool(true));
    assert_eq!(top(&format!("{source} 3 V @ 3 V @ ==")), Object::Bool(true));
    assert_eq!(top(&format!("{source} 1 V @ 2 V @ ==")), Object::Bool(false));
}

#[test]
fn without_cmp_instances_compare_by_identity() {
    let source = r#""A" @class =A A @ =a a a =="#;
    assert_eq!(top(source), Object::Bool(true));
    let source = r#""A" @class =A A @ A @ =="#;
    assert_eq!(top(source), Object::Bool(false));
}

#[test]
fn print_hook_controls_rendering() {
    let collector = CollectBytesPrint::new();
    let mut vm = Vm::with_writer(Box::new(collector.clone()));
    let source = r#"
        "P" @class =P
        [ =self "P!" .write ] $__print__ P .set_getter
        P @ @print
    "#;
    vm.eval_text(source.as_bytes(), "<test>").unwrap();
    assert_eq!(collector.output_string(), "P!\n");
}

#[test]
fn default_print_is_the_generic_object_form() {
    let collector = CollectBytesPrint::new();
    let mut vm = Vm::with_writer(Box::new(collector.clone()));
    vm.eval_text(br#""Thing" @class =Thing Thing @ @print"#, "<test>").unwrap();
    let output = collector.output_string();
    assert!(output.starts_with("<'Thing' object at 0x"), "got: {output}");
}

#[test]
fn class_copy_is_independent() {
    let source = r#"
        "A" @class =A
        5 A =.v
        "B" A .copy =B
        7 B =.v
        A .v B .v
    "#;
    let vm = run(source);
    assert_eq!(vm.stack_objects(), vec![Object::Int(5), Object::Int(7)]);
}

#[test]
fn getters_view_shares_class_storage() {
    let source = r#"
        "A" @class =A
        [ =self 1 ] $m A .set_getter
        A .__getters__ .len
    "#;
    assert_eq!(top(source), Object::Int(1));
}

#[test]
fn installed_function_must_carry_a_name() {
    assert_eq!(fails(r#""A" @class =A [ 1 ] A .set_getter"#), ErrorKind::Type);
}
