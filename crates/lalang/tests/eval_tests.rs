//! End-to-end evaluation through the public surface: compile source text,
//! run it on a fresh VM (no stdlib), and inspect the stack.

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
fn addition() {
    assert_eq!(top("2 3 +"), Object::Int(5));
}

#[test]
fn string_length() {
    assert_eq!(top(r#""hi" .len"#), Object::Int(2));
}

#[test]
fn named_function_squares() {
    assert_eq!(top("[ =x x x * ] =@square 4 @square"), Object::Int(16));
}

#[test]
fn for_loop_sums_a_range() {
    assert_eq!(top("0 [ + ] 0 10 @range @for"), Object::Int(45));
}

#[test]
fn class_with_init_exposes_attribute() {
    let source = r#"
        "Box" @class =Box
        [ =self 42 self =.x self ] $__init__ Box .set_getter
        Box @ .x
    "#;
    assert_eq!(top(source), Object::Int(42));
}

#[test]
fn times_pushes_indices_in_order() {
    let vm = run(r#""marker" 3 .times [ =i i ] @for"#);
    assert_eq!(
        vm.stack_objects(),
        vec![Object::str("marker"), Object::Int(0), Object::Int(1), Object::Int(2)]
    );
}

#[test]
fn int_literal_extremes_round_trip() {
    assert_eq!(top("9223372036854775807"), Object::Int(i64::MAX));
    assert_eq!(top("-9223372036854775808"), Object::Int(i64::MIN));
}

#[test]
fn store_then_load_yields_stored_value() {
    assert_eq!(top("5 =x x"), Object::Int(5));
    assert_eq!(top("[ 7 =y y ] =@f @f"), Object::Int(7));
}

#[test]
fn reference_before_first_store_reads_the_global() {
    // Inside the function, `x` before `=x` is the global; after, the local.
    assert_eq!(top("7 =x [ x 10 =x x + ] =@f @f"), Object::Int(17));
}

#[test]
fn quote_declares_local_without_emitting() {
    assert_eq!(top("[ 'x 5 =x x ] =@f @f"), Object::Int(5));
}

#[test]
fn function_locals_are_fresh_per_call() {
    assert_eq!(fails("[ 5 =a ] =@f @f [ a ] =@g @g"), ErrorKind::Name);
}

#[test]
fn code_block_inherits_enclosing_locals() {
    assert_eq!(top("[ 5 =v { v } @ ] =@f @f"), Object::Int(5));
}

#[test]
fn division_truncates_like_c() {
    assert_eq!(top("7 2 /"), Object::Int(3));
    assert_eq!(top("-7 2 /"), Object::Int(-3));
    assert_eq!(top("-7 2 %"), Object::Int(-1));
    assert_eq!(top("7 -2 %"), Object::Int(1));
}

#[test]
fn division_by_zero_is_fatal() {
    assert_eq!(fails("1 0 /"), ErrorKind::Type);
    assert_eq!(fails("1 0 %"), ErrorKind::Type);
}

#[test]
fn unary_operators() {
    assert_eq!(top("5 ~"), Object::Int(-5));
    assert_eq!(top("0 !"), Object::Int(-1));
    assert_eq!(top("true !"), Object::Bool(false));
}

#[test]
fn equality_is_reflexive_and_symmetric() {
    assert_eq!(top("null null =="), Object::Bool(true));
    assert_eq!(top("true true =="), Object::Bool(true));
    assert_eq!(top("2 2 =="), Object::Bool(true));
    assert_eq!(top(r#""a" "a" =="#), Object::Bool(true));
    assert_eq!(top("2 3 =="), Object::Bool(false));
    assert_eq!(top("2 3 !="), Object::Bool(true));
}

#[test]
fn equality_does_not_cross_types() {
    assert_eq!(top(r#"1 "1" =="#), Object::Bool(false));
    assert_eq!(top("true 1 =="), Object::Bool(false));
    assert_eq!(top("null false =="), Object::Bool(false));
}

#[test]
fn string_order_is_byte_lexicographic() {
    assert_eq!(top(r#""abc" "abd" <"#), Object::Bool(true));
    assert_eq!(top(r#""Z" "a" <"#), Object::Bool(true));
    assert_eq!(top(r#""ab" "abc" <="#), Object::Bool(true));
    assert_eq!(top(r#""b" "a" >"#), Object::Bool(true));
}

#[test]
fn bool_operators_coerce_their_argument() {
    assert_eq!(top("true null &"), Object::Bool(false));
    assert_eq!(top("false 1 |"), Object::Bool(true));
    assert_eq!(top("true true ^"), Object::Bool(false));
}

#[test]
fn while_loop_counts_to_ten() {
    assert_eq!(top("0 =n { n 10 < } { n 1 + =n } @while n"), Object::Int(10));
}

#[test]
fn ifelse_picks_a_branch() {
    assert_eq!(top(r#"1 2 < { "yes" } { "no" } @ifelse"#), Object::str("yes"));
    assert_eq!(top(r#"1 2 > { "yes" } { "no" } @ifelse"#), Object::str("no"));
}

#[test]
fn if_runs_only_on_truthy() {
    let vm = run("1 { 9 } @if");
    assert_eq!(vm.stack_objects(), vec![Object::Int(9)]);
    let vm = run("null { 9 } @if");
    assert_eq!(vm.stack_objects(), vec![]);
}

#[test]
fn is_compares_identity() {
    assert_eq!(top("null null @is"), Object::Bool(true));
    assert_eq!(top("5 5 @is"), Object::Bool(true));
    assert_eq!(top(r#""a" "a" @is"#), Object::Bool(true));
    assert_eq!(top("list .new list .new @is"), Object::Bool(false));
    assert_eq!(top("list .new @dup @is"), Object::Bool(true));
}

#[test]
fn stack_builtins() {
    let vm = run("1 2 @swap");
    assert_eq!(vm.stack_objects(), vec![Object::Int(2), Object::Int(1)]);
    let vm = run("1 @dup");
    assert_eq!(vm.stack_objects(), vec![Object::Int(1), Object::Int(1)]);
    let vm = run("1 2 @drop");
    assert_eq!(vm.stack_objects(), vec![Object::Int(1)]);
    let vm = run("1 2 3 @clear");
    assert_eq!(vm.stack_objects(), vec![]);
    // `get` copies from depth, `set` replaces at depth.
    let vm = run("10 20 1 @get");
    assert_eq!(vm.stack_objects(), vec![Object::Int(10), Object::Int(20), Object::Int(10)]);
    let vm = run("10 20 99 1 @set");
    assert_eq!(vm.stack_objects(), vec![Object::Int(99), Object::Int(20)]);
}

#[test]
fn stack_underflow_is_fatal() {
    assert_eq!(fails("+"), ErrorKind::Stack);
    assert_eq!(fails("@drop"), ErrorKind::Stack);
}

#[test]
fn unknown_global_is_fatal() {
    assert_eq!(fails("nonsense"), ErrorKind::Name);
    assert_eq!(fails("@nonsense"), ErrorKind::Name);
}

#[test]
fn unknown_attribute_is_fatal() {
    assert_eq!(fails("5 .missing"), ErrorKind::Name);
    assert_eq!(fails(r#""s" .missing"#), ErrorKind::Name);
}

#[test]
fn dollar_renames_the_function_on_top() {
    assert_eq!(top("[ 1 ] $one .name"), Object::str("one"));
    assert_eq!(fails("5 $x"), ErrorKind::Type);
}

#[test]
fn rename_store_names_the_stored_function() {
    assert_eq!(top("[ 2 ] =@two two .name"), Object::str("two"));
}

#[test]
fn func_copy_behaves_like_the_original() {
    let vm = run("[ 2 3 + ] =@f @f f .copy .@");
    assert_eq!(vm.stack_objects(), vec![Object::Int(5), Object::Int(5)]);
}

#[test]
fn func_copy_does_not_share_bound_locals() {
    let source = r#"
        [ 'n n ] =g
        5 "n" g .set_local
        g .copy =h
        7 "n" h .set_local
        @g @h
    "#;
    let vm = run(source);
    assert_eq!(vm.stack_objects(), vec![Object::Int(5), Object::Int(7)]);
}

#[test]
fn bound_stack_is_pushed_before_the_call() {
    let source = r#"
        [ + ] =add2
        2 add2 .push_stack
        10 @add2
    "#;
    assert_eq!(top(source), Object::Int(12));
}

#[test]
fn to_dict_returns_final_locals() {
    assert_eq!(
        top("[ 1 =a 2 =b ] .to_dict"),
        Object::Dict(vec![
            (b"a".to_vec(), Object::Int(1)),
            (b"b".to_vec(), Object::Int(2)),
        ])
    );
}

#[test]
fn globals_dict_is_live() {
    assert_eq!(top(r#"42 "answer" @globals .set answer"#), Object::Int(42));
}

#[test]
fn locals_is_null_at_top_level() {
    assert_eq!(top("@locals"), Object::Null);
}

#[test]
fn typeof_matches_type_globals() {
    assert_eq!(top("5 @typeof int @is"), Object::Bool(true));
    assert_eq!(top(r#""s" @typeof str @is"#), Object::Bool(true));
    assert_eq!(top("list .new @typeof list @is"), Object::Bool(true));
    assert_eq!(top("null @typeof nulltype @is"), Object::Bool(true));
}

#[test]
fn eval_builtin_compiles_and_runs() {
    assert_eq!(top(r#""2 3 +" @eval"#), Object::Int(5));
}

#[test]
fn eval_builtin_rejects_unterminated_blocks() {
    assert_eq!(fails(r#""{ 1" @eval"#), ErrorKind::Parse);
}

#[test]
fn error_builtin_aborts_with_user_error() {
    assert_eq!(fails(r#""boom" @error"#), ErrorKind::User);
}

#[test]
fn pair_builds_a_two_element_list() {
    assert_eq!(
        top("1 2 @pair"),
        Object::List(vec![Object::Int(1), Object::Int(2)])
    );
    let vm = run("1 2 @pair .unpair");
    assert_eq!(vm.stack_objects(), vec![Object::Int(1), Object::Int(2)]);
}

#[test]
fn list_build_unbuild_round_trips() {
    assert_eq!(
        top("1 2 3 3 list .build"),
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
    );
    assert_eq!(
        top("1 2 3 3 list .build .unbuild list .build"),
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
    );
}

#[test]
fn list_reverse_twice_is_identity() {
    let source = "1 2 3 3 list .build =l l .reverse l .reverse l";
    assert_eq!(
        top(source),
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
    );
}

#[test]
fn list_sort_orders_and_is_a_fixed_point() {
    let sorted = Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)]);
    assert_eq!(top("3 1 2 3 list .build =l l .sort l"), sorted);
    assert_eq!(top("3 1 2 3 list .build =l l .sort l .sort l"), sorted);
}

#[test]
fn list_methods() {
    assert_eq!(top("list .new =l 1 l .push 2 l .push l .len"), Object::Int(2));
    assert_eq!(top("list .new 1 , 2 , .len"), Object::Int(2));
    assert_eq!(top("10 20 2 list .build =l 1 l .get"), Object::Int(20));
    assert_eq!(top("10 20 2 list .build =l -1 l .get"), Object::Int(20));
    assert_eq!(
        top("10 20 2 list .build =l 99 0 l .set l"),
        Object::List(vec![Object::Int(99), Object::Int(20)])
    );
    // `pop` reads the last element without shrinking.
    let vm = run("10 20 2 list .build =l l .pop l .len");
    assert_eq!(vm.stack_objects(), vec![Object::Int(20), Object::Int(2)]);
    assert_eq!(
        top("1 1 list .build =a 2 1 list .build =b b a .extend a"),
        Object::List(vec![Object::Int(1), Object::Int(2)])
    );
}

#[test]
fn list_index_errors() {
    assert_eq!(fails("1 1 list .build =l 5 l .get"), ErrorKind::Index);
    assert_eq!(fails("1 1 list .build =l -2 l .get"), ErrorKind::Index);
}

#[test]
fn dict_build_preserves_insertion_order() {
    assert_eq!(
        top(r#""k1" 1 "k2" 2 2 dict .build"#),
        Object::Dict(vec![
            (b"k1".to_vec(), Object::Int(1)),
            (b"k2".to_vec(), Object::Int(2)),
        ])
    );
}

#[test]
fn dict_methods() {
    assert_eq!(top(r#"dict .new =d 1 "a" d .set "a" d .get"#), Object::Int(1));
    assert_eq!(top(r#"dict .new =d "a" d .has"#), Object::Bool(false));
    assert_eq!(top(r#"dict .new =d 1 "a" d .set "a" d .has"#), Object::Bool(true));
    assert_eq!(top(r#"dict .new =d 99 "missing" d .get_default"#), Object::Int(99));
    assert_eq!(top(r#"dict .new =d 1 "a" d .set 7 "a" d .get_default"#), Object::Int(1));
    assert_eq!(top(r#""a" 1 1 dict .build =d 0 d .get_key"#), Object::str("a"));
    assert_eq!(top(r#""a" 1 1 dict .build =d 0 d .get_value"#), Object::Int(1));
    assert_eq!(
        top(r#""a" 1 1 dict .build .copy"#),
        Object::Dict(vec![(b"a".to_vec(), Object::Int(1))])
    );
}

#[test]
fn dict_update_merges() {
    let source = r#"
        "a" 1 1 dict .build =d
        "b" 2 1 dict .build =e
        e d .update d
    "#;
    assert_eq!(
        top(source),
        Object::Dict(vec![
            (b"a".to_vec(), Object::Int(1)),
            (b"b".to_vec(), Object::Int(2)),
        ])
    );
}

#[test]
fn dict_missing_key_is_fatal() {
    assert_eq!(fails(r#"dict .new =d "k" d .get"#), ErrorKind::Name);
    assert_eq!(fails(r#"dict .new =d 0 d .get_key"#), ErrorKind::Index);
}

#[test]
fn string_escapes_decode_in_literals() {
    assert_eq!(top(r#""a\nb" .len"#), Object::Int(3));
    assert_eq!(top(r#""a\nb""#), Object::Str(b"a\nb".to_vec()));
    assert_eq!(top(r#""a\\b""#), Object::Str(b"a\\b".to_vec()));
    assert_eq!(top(r#""say \"hi\"" .len"#), Object::Int(8));
}

#[test]
fn string_methods() {
    assert_eq!(top(r#""hello" "x" +"#), Object::str("hellox"));
    assert_eq!(top(r#"0 "hello" .get"#), Object::str("h"));
    assert_eq!(top(r#"-1 "hello" .get"#), Object::str("o"));
    assert_eq!(top(r#""l" "hello" .has"#), Object::Bool(true));
    assert_eq!(top(r#""z" "hello" .has"#), Object::Bool(false));
    assert_eq!(top(r#""l" "L" "hello" .replace"#), Object::str("heLLo"));
}

#[test]
fn string_index_out_of_range_is_fatal() {
    assert_eq!(fails(r#"9 "hi" .get"#), ErrorKind::Index);
}

#[test]
fn print_goes_through_the_writer() {
    let collector = CollectBytesPrint::new();
    let mut vm = Vm::with_writer(Box::new(collector.clone()));
    vm.eval_text(b"5 @print", "<test>").unwrap();
    assert_eq!(collector.output_string(), "5\n");
    let _ = collector.take();
    vm.eval_text(br#""hi" @print"#, "<test>").unwrap();
    assert_eq!(collector.output_string(), "\"hi\"\n");
    let _ = collector.take();
    vm.eval_text(b"1 2 2 list .build @print", "<test>").unwrap();
    assert_eq!(collector.output_string(), "[1, 2]\n");
}

#[test]
fn write_emits_raw_bytes() {
    let collector = CollectBytesPrint::new();
    let mut vm = Vm::with_writer(Box::new(collector.clone()));
    vm.eval_text(br#""hi" .write "!" .writeline"#, "<test>").unwrap();
    assert_eq!(collector.output_string(), "hi!\n");
}

#[test]
fn range_yields_exactly_the_interval() {
    assert_eq!(top("0 [ @drop 1 + ] 2 5 @range @for"), Object::Int(3));
    assert_eq!(top("0 [ @drop 1 + ] 5 2 @range @for"), Object::Int(0));
    assert_eq!(top("0 [ @drop 1 + ] -3 3 @range @for"), Object::Int(6));
}
