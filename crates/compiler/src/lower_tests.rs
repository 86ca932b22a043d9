// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use garnet_common::{CancellationFlag, CompileError, LowerOptions, WarningKind};
    use garnet_ir::visit::{count, walk};
    use garnet_ir::{
        CallingConvention, ClosureKind, CompiledUnit, ConstantScope, Node, ReturnTarget,
        SuperArguments,
    };
    use garnet_syntax::build::*;
    use garnet_syntax::{
        AssignOperator, HashPatternRest, NodeKind, OpTarget, ParamTarget, Parameters,
        RequiredParam, Span, SyntaxNode,
    };
    use test_case::test_case;

    use crate::testing::{CallArgs, Evaluator, SuperCall, Value, lower, lower_with, run, run_with};
    use crate::{LowerSession, lower_closure, lower_top_level};

    fn record(values: Vec<SyntaxNode>) -> SyntaxNode {
        fcall("record", values)
    }

    fn ints(values: &[i64]) -> SyntaxNode {
        array(values.iter().map(|v| int(*v)).collect())
    }

    fn eq(left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
        call(left, "==", vec![right])
    }

    /// What the script passed to `record`, or the error it stopped with.
    fn recorded(tree: &SyntaxNode) -> String {
        let run = run(tree).unwrap();
        match &run.result {
            Ok(_) => format!("{:?}", run.recorded()),
            Err(error) => format!("error: {error}"),
        }
    }

    fn method_unit(unit: &CompiledUnit, name: &str) -> Arc<CompiledUnit> {
        let mut found = None;
        walk(&unit.body, &mut |node| {
            if let Node::MethodDefinition { name: n, unit, .. } = node
                && *n == name
            {
                found = Some(unit.clone());
            }
        });
        found.expect("method definition")
    }

    fn closures_in(node: &Node) -> Vec<Arc<garnet_ir::ClosureDefinition>> {
        let mut found = vec![];
        walk(node, &mut |node| {
            if let Node::Closure(definition) = node {
                found.push(definition.clone());
            }
        });
        found
    }

    #[test_case(&[1, 2] => "[[1, 10, 20, [], 2]]"; "pre and post only")]
    #[test_case(&[1, 2, 3] => "[[1, 2, 20, [], 3]]"; "first optional")]
    #[test_case(&[1, 2, 3, 4] => "[[1, 2, 3, [], 4]]"; "both optionals")]
    #[test_case(&[1, 2, 3, 4, 5, 6] => "[[1, 2, 3, [4, 5], 6]]"; "rest in the middle")]
    #[test_case(&[1] => "error: wrong number of arguments (given 1, expected 2)"; "too few")]
    fn test_positional_binding(arguments: &[i64]) -> String {
        // def m(a, b = 10, c = 20, *r, d) = record([a, b, c, r, d])
        let params = params()
            .req("a")
            .opt("b", int(10))
            .opt("c", int(20))
            .rest("r")
            .post("d")
            .build();
        let body = record(vec![array(vec![
            lvar("a"),
            lvar("b"),
            lvar("c"),
            lvar("r"),
            lvar("d"),
        ])]);
        let tree = seq(vec![
            def("m", Some(params), Some(body), &[]),
            fcall("m", arguments.iter().map(|a| int(*a)).collect()),
        ]);
        recorded(&tree)
    }

    #[test]
    fn test_post_parameters_without_rest() {
        // def m(a, b = 5, c) with two and three arguments
        let params = params().req("a").opt("b", int(5)).post("c").build();
        let body = record(vec![array(vec![lvar("a"), lvar("b"), lvar("c")])]);
        let tree = seq(vec![
            def("m", Some(params), Some(body), &[]),
            fcall("m", vec![int(1), int(2)]),
            fcall("m", vec![int(1), int(2), int(3)]),
        ]);
        assert_eq!(recorded(&tree), "[[1, 5, 2], [1, 2, 3]]");
    }

    #[test]
    fn test_keyword_binding() {
        // def m(a, k:, o: 5, **kw) = record([a, k, o, kw]); m(1, k: 2, z: 3)
        let params = params()
            .req("a")
            .key("k")
            .key_opt("o", int(5))
            .kwrest("kw")
            .build();
        let body = record(vec![array(vec![
            lvar("a"),
            lvar("k"),
            lvar("o"),
            lvar("kw"),
        ])]);
        let define = def("m", Some(params), Some(body), &[]);

        let tree = seq(vec![
            define.clone(),
            fcall("m", vec![int(1), keywords(vec![("k", int(2)), ("z", int(3))])]),
        ]);
        assert_eq!(recorded(&tree), "[[1, 2, 5, {:z => 3}]]");

        let missing = seq(vec![define, fcall("m", vec![int(1)])]);
        assert_eq!(recorded(&missing), "error: missing keyword: :k");
    }

    #[test]
    fn test_unknown_keyword_without_keyword_rest() {
        let params = params().key_opt("k", int(1)).build();
        let tree = seq(vec![
            def("m", Some(params), Some(lvar("k")), &[]),
            fcall("m", vec![keywords(vec![("j", int(2))])]),
        ]);
        assert_eq!(recorded(&tree), "error: unknown keyword: :j");
    }

    /// `p = proc { |params| record([names]) }; p.call(1, passed)`
    fn call_proc_with(params: Parameters, names: &[&str], passed: &[(&str, i64)]) -> SyntaxNode {
        let body = record(vec![array(names.iter().copied().map(lvar).collect())]);
        let mut arguments = vec![int(1)];
        if !passed.is_empty() {
            arguments.push(keywords(passed.iter().map(|(k, v)| (*k, int(*v))).collect()));
        }
        seq(vec![
            lasgn(
                "p",
                with_block(fcall("proc", vec![]), block(Some(params), Some(body), &[])),
            ),
            call(lvar("p"), "call", arguments),
        ])
    }

    #[test_case(params().req("a").key("k").build(), &[] => "error: missing keyword: :k";
        "missing required keyword")]
    #[test_case(params().req("a").key("k").build(), &[("k", 2)] => "[[1, 2]]";
        "required keyword given")]
    #[test_case(params().req("a").key_opt("k", int(5)).build(), &[("j", 2)]
        => "error: unknown keyword: :j"; "undeclared keyword")]
    #[test_case(params().req("a").key_opt("k", int(5)).build(), &[] => "[[1, 5]]";
        "optional keyword defaults")]
    #[test_case(params().req("a").key_opt("k", int(5)).kwrest("kw").build(), &[("j", 2)]
        => "[[1, 5]]"; "keyword rest absorbs undeclared")]
    fn test_proc_checks_its_keywords(params: Parameters, passed: &[(&str, i64)]) -> String {
        recorded(&call_proc_with(params, &["a", "k"], passed))
    }

    #[test_case(&[] => "[[1]]"; "no keywords passed")]
    #[test_case(&[("k", 2)] => "error: no keywords accepted"; "keywords rejected")]
    fn test_no_keywords_parameter(passed: &[(&str, i64)]) -> String {
        let params = params().req("a").no_keywords().build();
        recorded(&call_proc_with(params, &["a"], passed))
    }

    #[test]
    fn test_method_rejects_keywords_with_no_keywords_parameter() {
        let params = params().req("a").no_keywords().build();
        let tree = seq(vec![
            def("m", Some(params), Some(record(vec![lvar("a")])), &[]),
            fcall("m", vec![int(1)]),
            fcall("m", vec![int(2), keywords(vec![("k", int(3))])]),
        ]);
        assert_eq!(recorded(&tree), "error: no keywords accepted");
        assert_eq!(run(&tree).unwrap().recorded(), vec![Value::Int(1)]);
    }

    #[test]
    fn test_defaults_are_lowered_once_per_parameter_list() {
        // proc { |a, b = (1 if "x")| b }
        let default = if_(str("x"), Some(int(1)), None);
        let params = params().req("a").opt("b", default).build();
        let tree = seq(vec![with_block(
            fcall("proc", vec![]),
            block(Some(params), Some(lvar("b")), &[]),
        )]);
        let unit = lower(&tree).unwrap();
        let literal_warnings = unit
            .warnings
            .pending()
            .iter()
            .filter(|w| w.kind == WarningKind::LiteralInCondition)
            .count();
        assert_eq!(literal_warnings, 1);
    }

    #[test]
    fn test_shared_default_reads_the_bound_parameter() {
        // p = proc { |a, b = a + 1| record([a, b]) }; p.call([5]); p.call(7)
        let params = params()
            .req("a")
            .opt("b", call(lvar("a"), "+", vec![int(1)]))
            .build();
        let body = record(vec![array(vec![lvar("a"), lvar("b")])]);
        let tree = seq(vec![
            lasgn(
                "p",
                with_block(fcall("proc", vec![]), block(Some(params), Some(body), &[])),
            ),
            call(lvar("p"), "call", vec![ints(&[5])]),
            call(lvar("p"), "call", vec![int(7)]),
        ]);
        assert_eq!(recorded(&tree), "[[5, 6], [7, 8]]");
    }

    #[test]
    fn test_optional_default_may_yield() {
        // def m(a, b = yield(a)) = b; record(m(2) { |x| x * 3 })
        let params = params().req("a").opt("b", yield_(vec![lvar("a")])).build();
        let block_literal = block(
            Some(params_x()),
            Some(call(lvar("x"), "*", vec![int(3)])),
            &[],
        );
        let tree = seq(vec![
            def("m", Some(params), Some(lvar("b")), &[]),
            record(vec![with_block(fcall("m", vec![int(2)]), block_literal)]),
        ]);
        assert_eq!(recorded(&tree), "[6]");
    }

    fn params_x() -> garnet_syntax::Parameters {
        params().req("x").build()
    }

    #[test]
    fn test_forwarding_passes_everything_on() {
        // def inner(*a, **k, &b) = record([a, k, b.call]); def outer(...) = inner(...)
        let inner_params = params().rest("a").kwrest("k").block("b").build();
        let inner_body = record(vec![array(vec![
            lvar("a"),
            lvar("k"),
            call(lvar("b"), "call", vec![]),
        ])]);
        let forwarded = SyntaxNode::new(NodeKind::ForwardedArguments, Span::default());
        let tree = seq(vec![
            def("inner", Some(inner_params), Some(inner_body), &[]),
            def(
                "outer",
                Some(params().forwarding().build()),
                Some(fcall("inner", vec![forwarded])),
                &[],
            ),
            with_block(
                fcall("outer", vec![int(1), int(2), keywords(vec![("x", int(3))])]),
                block(None, Some(sym("blocked")), &[]),
            ),
        ]);
        assert_eq!(recorded(&tree), "[[[1, 2], {:x => 3}, :blocked]]");
    }

    #[test]
    fn test_proc_auto_splat_and_lambda_strictness() {
        let two = || params().req("a").req("b").build();
        let body = || record(vec![array(vec![lvar("a"), lvar("b")])]);
        let tree = seq(vec![
            lasgn("p", with_block(fcall("proc", vec![]), block(Some(two()), Some(body()), &[]))),
            call(lvar("p"), "call", vec![ints(&[1, 2])]),
            call(lvar("p"), "call", vec![int(3)]),
            lasgn(
                "l",
                with_block(fcall("lambda", vec![]), block(Some(two()), Some(body()), &[])),
            ),
            call(lvar("l"), "call", vec![int(4), int(5)]),
            call(lvar("l"), "call", vec![ints(&[1, 2])]),
        ]);
        assert_eq!(
            recorded(&tree),
            "error: wrong number of arguments (given 1, expected 2)"
        );
        let run = run(&tree).unwrap();
        assert_eq!(
            run.recorded(),
            vec![
                Value::ints(&[1, 2]),
                Value::array(vec![Value::Int(3), Value::Nil]),
                Value::ints(&[4, 5]),
            ]
        );
    }

    #[test]
    fn test_destructuring_block_parameter() {
        // [[1, [2, 3]]].each { |a, (b, c)| record([a, b, c]) }
        let params = params()
            .req("a")
            .destructure(ParamTarget {
                lefts: vec![
                    RequiredParam::Named("b".to_string()),
                    RequiredParam::Named("c".to_string()),
                ],
                rest: None,
                rights: vec![],
            })
            .build();
        let body = record(vec![array(vec![lvar("a"), lvar("b"), lvar("c")])]);
        let tree = seq(vec![with_block(
            call(
                array(vec![array(vec![int(1), ints(&[2, 3])])]),
                "each",
                vec![],
            ),
            block(Some(params), Some(body), &[]),
        )]);
        assert_eq!(recorded(&tree), "[[1, 2, 3]]");
    }

    #[test]
    fn test_multiple_assignment_splits_around_rest() {
        // v = (a, *b, c = [1, 2, 3, 4, 5])
        let tree = seq(vec![
            lasgn(
                "v",
                masgn(locals_target(&["a"], Some("b"), &["c"]), ints(&[1, 2, 3, 4, 5])),
            ),
            record(vec![lvar("a"), lvar("b"), lvar("c"), lvar("v")]),
        ]);
        let run = run(&tree).unwrap();
        assert!(run.result.is_ok());
        let recorded = run.recorded();
        assert_eq!(recorded[0], Value::Int(1));
        assert_eq!(recorded[1], Value::ints(&[2, 3, 4]));
        assert_eq!(recorded[2], Value::Int(5));

        let Value::Array(middle) = &recorded[1] else {
            panic!("rest is not an array");
        };
        let mut reassembled = vec![recorded[0].clone()];
        reassembled.extend(middle.borrow().iter().cloned());
        reassembled.push(recorded[2].clone());
        assert_eq!(Value::array(reassembled), recorded[3]);
    }

    #[test_case(&["a", "b"], None, &[], int(1) => "[1, nil]"; "scalar spreads with nil")]
    #[test_case(&["a", "b"], None, &[], nil() => "[nil, nil]"; "nil wraps")]
    #[test_case(&[], Some("a"), &["b"], ints(&[1, 2, 3]) => "[[1, 2], 3]"; "leading rest")]
    #[test_case(&["a"], Some(""), &["b"], ints(&[1, 2, 3]) => "[1, 3]"; "anonymous rest")]
    #[test_case(&["a"], Some("b"), &["c"], ints(&[1]) => "[1, [], nil]"; "short array")]
    fn test_multiple_assignment_shapes(
        lefts: &[&str],
        rest: Option<&str>,
        rights: &[&str],
        value: SyntaxNode,
    ) -> String {
        let named_rest = rest.filter(|r| !r.is_empty());
        let reads = lefts
            .iter()
            .chain(named_rest.iter())
            .chain(rights)
            .map(|n| lvar(n))
            .collect();
        let tree = seq(vec![
            masgn(locals_target(lefts, rest, rights), value),
            record(vec![array(reads)]),
        ]);
        let recorded = recorded(&tree);
        recorded[1..recorded.len() - 1].to_string()
    }

    #[test]
    fn test_break_from_block_ends_its_call() {
        // r = [1, 2, 3].each { |x| break x * 10 if x == 2; record(x) }
        let body = seq(vec![
            if_(
                eq(lvar("x"), int(2)),
                Some(break_(Some(call(lvar("x"), "*", vec![int(10)])))),
                None,
            ),
            record(vec![lvar("x")]),
        ]);
        let tree = seq(vec![
            lasgn(
                "r",
                with_block(
                    call(ints(&[1, 2, 3]), "each", vec![]),
                    block(Some(params_x()), Some(body), &[]),
                ),
            ),
            record(vec![lvar("r")]),
        ]);
        assert_eq!(recorded(&tree), "[1, 20]");
    }

    #[test]
    fn test_break_in_loop_inside_block() {
        // out = [1, 2].each { |x| i = 0; while true; i += 1; break if i > 3; end; record(i) }
        let loop_body = seq(vec![
            op_assign(
                OpTarget::Local {
                    name: "i".to_string(),
                },
                AssignOperator::Binary("+".to_string()),
                int(1),
            ),
            if_(call(lvar("i"), ">", vec![int(3)]), Some(break_(None)), None),
        ]);
        let body = seq(vec![
            lasgn("i", int(0)),
            while_(true_(), loop_body),
            record(vec![lvar("i")]),
        ]);
        let tree = seq(vec![
            lasgn(
                "out",
                with_block(
                    call(ints(&[1, 2]), "each", vec![]),
                    block(Some(params_x()), Some(body), &[]),
                ),
            ),
            record(vec![lvar("out")]),
        ]);
        assert_eq!(recorded(&tree), "[4, 4, [1, 2]]");
    }

    #[test]
    fn test_break_in_block_inside_loop() {
        // n = 0
        // while n < 2; n += 1; [10, 20].each { |y| break if y == 20; record(y) }; record(n); end
        let block_body = seq(vec![
            if_(eq(lvar("y"), int(20)), Some(break_(None)), None),
            record(vec![lvar("y")]),
        ]);
        let loop_body = seq(vec![
            op_assign(
                OpTarget::Local {
                    name: "n".to_string(),
                },
                AssignOperator::Binary("+".to_string()),
                int(1),
            ),
            with_block(
                call(ints(&[10, 20]), "each", vec![]),
                block(Some(params().req("y").build()), Some(block_body), &[]),
            ),
            record(vec![lvar("n")]),
        ]);
        let tree = seq(vec![
            lasgn("n", int(0)),
            while_(call(lvar("n"), "<", vec![int(2)]), loop_body),
        ]);
        assert_eq!(recorded(&tree), "[10, 1, 10, 2]");

        // One call-site marker serves every iteration.
        let unit = lower(&tree).unwrap();
        assert_eq!(count(&unit.body, |n| matches!(n, Node::FrameOnStack { .. })), 1);
        let markers = unit
            .frame
            .names()
            .iter()
            .filter(|n| n.starts_with("%frame_on_stack"))
            .count();
        assert_eq!(markers, 1);
    }

    #[test]
    fn test_next_supplies_block_value() {
        // [1, 2, 3].map { |x| next 0 if x == 2; x }
        let body = seq(vec![
            if_(eq(lvar("x"), int(2)), Some(next(Some(int(0)))), None),
            lvar("x"),
        ]);
        let tree = seq(vec![record(vec![with_block(
            call(ints(&[1, 2, 3]), "map", vec![]),
            block(Some(params_x()), Some(body), &[]),
        )])]);
        assert_eq!(recorded(&tree), "[[1, 0, 3]]");
    }

    #[test]
    fn test_proc_return_leaves_the_method() {
        // def m; [1, 2].each { |x| return x * 100 }; 0; end
        let body = seq(vec![
            with_block(
                call(ints(&[1, 2]), "each", vec![]),
                block(
                    Some(params_x()),
                    Some(return_(Some(call(lvar("x"), "*", vec![int(100)])))),
                    &[],
                ),
            ),
            int(0),
        ]);
        let tree = seq(vec![
            def("m", None, Some(body), &[]),
            record(vec![fcall("m", vec![])]),
        ]);
        assert_eq!(recorded(&tree), "[100]");
    }

    #[test]
    fn test_lambda_return_stays_in_the_lambda() {
        // def n; l = lambda { return 1 }; record(l.call); 2; end; record(n)
        let body = seq(vec![
            lasgn(
                "l",
                with_block(
                    fcall("lambda", vec![]),
                    block(None, Some(return_(Some(int(1)))), &[]),
                ),
            ),
            record(vec![call(lvar("l"), "call", vec![])]),
            int(2),
        ]);
        let tree = seq(vec![
            def("n", None, Some(body), &[]),
            record(vec![fcall("n", vec![])]),
        ]);
        assert_eq!(recorded(&tree), "[1, 2]");
    }

    #[test]
    fn test_stabby_lambda() {
        let literal = block(
            Some(params().req("a").build()),
            Some(call(lvar("a"), "+", vec![int(1)])),
            &[],
        );
        let tree = seq(vec![
            lasgn("l", lambda(literal)),
            record(vec![call(lvar("l"), "call", vec![int(2)])]),
            call(lvar("l"), "call", vec![]),
        ]);
        assert_eq!(
            recorded(&tree),
            "error: wrong number of arguments (given 0, expected 1)"
        );
        let unit = lower(&tree).unwrap();
        let closures = closures_in(&unit.body);
        assert_eq!(closures.len(), 1);
        assert_eq!(closures[0].kind, ClosureKind::StabbyLambda);
        assert!(closures[0].proc_entry().is_none());
    }

    #[test]
    fn test_closure_entries_share_state_but_not_nodes() {
        garnet_common::tracing::init_test_tracing();
        // { |a, b| count = count + 1; [a, b] }, compiled with `count` captured
        let literal = block(
            Some(params().req("a").req("b").build()),
            Some(seq(vec![
                lasgn("count", call(lvar("count"), "+", vec![int(1)])),
                array(vec![lvar("a"), lvar("b")]),
            ])),
            &[],
        );
        let mut session = LowerSession::default();
        let definition =
            lower_closure(&mut session, &literal, ClosureKind::Proc, &["count"]).unwrap();
        assert!(definition.targets.is_built(CallingConvention::Proc));
        assert!(!definition.targets.is_built(CallingConvention::Lambda));

        let evaluator = Evaluator::new();
        let (as_proc, as_lambda) = evaluator.instantiate(definition.clone(), vec![Value::Int(0)]);
        assert_eq!(
            evaluator.call(&as_proc, CallArgs::positional(vec![Value::ints(&[1, 2])])),
            Ok(Value::ints(&[1, 2]))
        );
        assert!(
            evaluator
                .call(&as_lambda, CallArgs::positional(vec![Value::ints(&[1, 2])]))
                .is_err()
        );
        assert_eq!(
            evaluator.call(&as_lambda, CallArgs::positional(vec![Value::Int(3), Value::Int(4)])),
            Ok(Value::ints(&[3, 4]))
        );
        assert!(definition.targets.is_built(CallingConvention::Lambda));
        assert_eq!(evaluator.captured(&as_proc, 0), Some(Value::Int(2)));

        let proc_entry = definition.proc_entry().unwrap();
        let lambda_entry = definition.lambda_entry().unwrap();
        assert!(!Arc::ptr_eq(&proc_entry.body, &lambda_entry.body));
        assert_eq!(*proc_entry.body, *lambda_entry.body);
        assert_ne!(proc_entry.prelude, lambda_entry.prelude);
    }

    #[test]
    fn test_lambda_call_builds_proc_entry_on_demand() {
        let literal = block(None, Some(return_(Some(int(7)))), &[]);
        let mut session = LowerSession::default();
        let definition =
            lower_closure(&mut session, &literal, ClosureKind::LambdaCall, &[]).unwrap();
        assert!(definition.targets.is_built(CallingConvention::Lambda));
        assert!(!definition.targets.is_built(CallingConvention::Proc));

        let evaluator = Evaluator::new();
        let (as_proc, as_lambda) = evaluator.instantiate(definition.clone(), vec![]);
        assert_eq!(
            evaluator.call(&as_lambda, CallArgs::default()),
            Ok(Value::Int(7))
        );
        // As a proc, the return targets the enclosing script rather than the closure.
        assert_eq!(
            evaluator.call(&as_proc, CallArgs::default()),
            Err("unexpected return".to_string())
        );
        assert!(definition.targets.is_built(CallingConvention::Proc));
    }

    #[test]
    fn test_module_body_block_returns() {
        // module M; [1].each { return 1 }; end
        let tree = seq(vec![module_def(
            "M",
            Some(with_block(
                call(ints(&[1]), "each", vec![]),
                block(None, Some(return_(Some(int(1)))), &[]),
            )),
            &[],
        )]);
        let unit = lower(&tree).unwrap();
        let mut bodies = vec![];
        walk(&unit.body, &mut |node| {
            if let Node::ModuleDefinition { body, .. } = node {
                bodies.push(body.clone());
            }
        });
        let closures = closures_in(&bodies[0].body);
        let definition = &closures[0];
        let invalid = |node: &Node| {
            matches!(
                node,
                Node::Return {
                    target: ReturnTarget::Invalid,
                    ..
                }
            )
        };
        let proc_entry = definition.proc_entry().unwrap();
        assert_eq!(count(&proc_entry.body, invalid), 1);
        let lambda_entry = definition.lambda_entry().unwrap();
        assert_eq!(count(&lambda_entry.body, invalid), 0);
    }

    #[test]
    fn test_zsuper_reloads_current_values_two_blocks_deep() {
        // def m(a, *r, k: 1); a = 10; [1].each { [2].each { super } }; end; m(1, 2, 3, k: 5)
        let params = params().req("a").rest("r").key_opt("k", int(1)).build();
        let inner = with_block(
            call(ints(&[2]), "each", vec![]),
            block(None, Some(zsuper()), &[]),
        );
        let body = seq(vec![
            lasgn("a", int(10)),
            with_block(call(ints(&[1]), "each", vec![]), block(None, Some(inner), &[])),
        ]);
        let tree = seq(vec![
            def("m", Some(params), Some(body), &[]),
            fcall(
                "m",
                vec![int(1), int(2), int(3), keywords(vec![("k", int(5))])],
            ),
        ]);
        let run = run(&tree).unwrap();
        assert_eq!(run.result, Ok(Value::ints(&[1])));
        assert_eq!(
            *run.evaluator.supers.borrow(),
            vec![SuperCall {
                arguments: vec![Value::Int(10), Value::Int(2), Value::Int(3)],
                keywords: Some(Value::hash(vec![(Value::sym("k"), Value::Int(5))])),
                has_block: false,
            }]
        );
    }

    #[test]
    fn test_zsuper_passes_the_method_block() {
        // def m(&b); super; end; m { }
        let tree = seq(vec![
            def("m", Some(params().block("b").build()), Some(zsuper()), &[]),
            with_block(fcall("m", vec![]), block(None, None, &[])),
        ]);
        let run = run(&tree).unwrap();
        assert!(run.evaluator.supers.borrow()[0].has_block);
    }

    #[test]
    fn test_super_through_define_method() {
        let define = |body| {
            with_block(
                fcall("define_method", vec![sym("x")]),
                block(None, Some(body), &[]),
            )
        };
        let at_top = seq(vec![define(zsuper())]);
        assert!(matches!(
            lower(&at_top),
            Err(CompileError::SuperOutsideMethod {
                inside_define_method: true,
                ..
            })
        ));

        let in_method = seq(vec![def("m", None, Some(define(zsuper())), &[])]);
        let unit = lower(&in_method).unwrap();
        let method = method_unit(&unit, "m");
        let closures = closures_in(&method.body);
        let body = &closures[0].proc_entry().unwrap().body;
        let flagged = count(body, |n| {
            matches!(
                n,
                Node::Super {
                    arguments: SuperArguments::Reload {
                        inside_define_method: true,
                        ..
                    },
                    ..
                }
            )
        });
        assert_eq!(flagged, 1);
    }

    #[test]
    fn test_user_errors() {
        let in_block = |body| {
            with_block(call(ints(&[1]), "each", vec![]), block(None, Some(body), &[]))
        };
        let cases = vec![
            (seq(vec![break_(None)]), "Invalid break"),
            (seq(vec![next(None)]), "Invalid next"),
            (seq(vec![redo()]), "Invalid redo"),
            (seq(vec![retry()]), "Invalid retry"),
            (seq(vec![yield_(vec![])]), "Invalid yield"),
            (seq(vec![in_block(yield_(vec![]))]), "Invalid yield"),
            (seq(vec![zsuper()]), "super called outside of method"),
            (
                seq(vec![module_def("M", Some(return_(None)), &[])]),
                "Invalid return in class/module body",
            ),
        ];
        for (tree, message) in cases {
            let error = lower(&tree).unwrap_err();
            assert!(!error.is_internal(), "{error}");
            assert!(error.to_string().contains(message), "{error}");
        }

        // Legal in the right place.
        assert!(lower(&seq(vec![in_block(next(None))])).is_ok());
        assert!(lower(&seq(vec![in_block(redo())])).is_ok());
        assert!(
            lower(&seq(vec![begin(
                int(1),
                vec![rescue_clause(vec![], None, retry())],
                None,
                None
            )]))
            .is_ok()
        );
    }

    #[test]
    fn test_error_carries_line() {
        let tree = seq(vec![int(1), at(break_(None), 7)]);
        let error = lower(&tree).unwrap_err();
        assert_eq!(error.context().map(|c| c.line), Some(7));
        assert_eq!(error.to_string(), "line 7: Invalid break");
    }

    fn array_pattern_case() -> SyntaxNode {
        // case v in [a, *b, c] then record([a, b, c]) end
        seq(vec![case_in(
            lvar("v"),
            vec![in_clause(
                pat_array(vec![pat_bind("a")], Some("b"), vec![pat_bind("c")]),
                None,
                record(vec![array(vec![lvar("a"), lvar("b"), lvar("c")])]),
            )],
            None,
        )])
    }

    #[test_case(&[1, 2, 3, 4] => "[[1, [2, 3], 4]]"; "long")]
    #[test_case(&[1, 2] => "[[1, [], 2]]"; "exact minimum")]
    #[test_case(&[1] => "error: NoMatchingPatternError ([1])"; "too short")]
    fn test_array_pattern(values: &[i64]) -> String {
        let run = run_with(&array_pattern_case(), vec![("v", Value::ints(values))]).unwrap();
        match run.result {
            Ok(_) => format!("{:?}", run.recorded()),
            Err(error) => format!("error: {error}"),
        }
    }

    #[test]
    fn test_find_pattern() {
        // case v in [*pre, 3, *post] then record(pre, post) else record(:none) end
        let tree = seq(vec![case_in(
            lvar("v"),
            vec![in_clause(
                pat_find("pre", vec![pat_value(int(3))], "post"),
                None,
                record(vec![lvar("pre"), lvar("post")]),
            )],
            Some(record(vec![sym("none")])),
        )]);
        let run = run_with(&tree, vec![("v", Value::ints(&[1, 2, 3, 4, 5]))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::ints(&[1, 2]), Value::ints(&[4, 5])]);

        let run = run_with(&tree, vec![("v", Value::ints(&[1, 2]))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::sym("none")]);
    }

    #[test]
    fn test_hash_pattern() {
        // case v in {a:, b: 2} then record(a) else record(:none) end
        let tree = seq(vec![case_in(
            lvar("v"),
            vec![in_clause(
                pat_hash(vec![("a", None), ("b", Some(pat_value(int(2))))], None),
                None,
                record(vec![lvar("a")]),
            )],
            Some(record(vec![sym("none")])),
        )]);
        let hash = |b| Value::hash(vec![(Value::sym("a"), Value::Int(1)), (Value::sym("b"), b)]);

        let run = run_with(&tree, vec![("v", hash(Value::Int(2)))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::Int(1)]);
        let run = run_with(&tree, vec![("v", hash(Value::Int(3)))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::sym("none")]);
        let run = run_with(&tree, vec![("v", Value::ints(&[1]))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::sym("none")]);
    }

    #[test_case(Some(HashPatternRest::Named("rest".to_string())), &[("a", 1), ("b", 2)]
        => "[{:b => 2}]"; "named rest takes the leftovers")]
    #[test_case(Some(HashPatternRest::NoKeywords), &[("a", 1)] => "[:hit]"; "no rest exact")]
    #[test_case(Some(HashPatternRest::NoKeywords), &[("a", 1), ("b", 2)] => "[:none]";
        "no rest with leftovers")]
    #[test_case(Some(HashPatternRest::Anonymous), &[("a", 1), ("b", 2)] => "[:hit]";
        "anonymous rest")]
    #[test_case(None, &[("a", 1), ("b", 2)] => "[:hit]"; "extra keys allowed")]
    fn test_hash_pattern_rest(rest: Option<HashPatternRest>, pairs: &[(&str, i64)]) -> String {
        // case v in {a: 1, **rest} then ... else record(:none) end
        let body = match &rest {
            Some(HashPatternRest::Named(name)) => record(vec![lvar(name)]),
            _ => record(vec![sym("hit")]),
        };
        let tree = seq(vec![case_in(
            lvar("v"),
            vec![in_clause(pat_hash(vec![("a", Some(pat_value(int(1))))], rest), None, body)],
            Some(record(vec![sym("none")])),
        )]);
        let hash = Value::hash(
            pairs
                .iter()
                .map(|(k, v)| (Value::sym(k), Value::Int(*v)))
                .collect(),
        );
        let run = run_with(&tree, vec![("v", hash)]).unwrap();
        format!("{:?}", run.recorded())
    }

    #[test]
    fn test_empty_hash_pattern_matches_only_empty_hashes() {
        let tree = seq(vec![case_in(
            lvar("v"),
            vec![in_clause(pat_hash(vec![], None), None, record(vec![sym("empty")]))],
            Some(record(vec![sym("other")])),
        )]);
        let run = run_with(&tree, vec![("v", Value::hash(vec![]))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::sym("empty")]);
        let one = Value::hash(vec![(Value::sym("a"), Value::Int(1))]);
        let run = run_with(&tree, vec![("v", one)]).unwrap();
        assert_eq!(run.recorded(), vec![Value::sym("other")]);
    }

    #[test_case(1 => "[:small]")]
    #[test_case(2 => "[:small]")]
    #[test_case(3 => "[:other]")]
    fn test_alternation_without_bindings(value: i64) -> String {
        // case v in 1 | 2 then record(:small) else record(:other) end
        let tree = seq(vec![case_in(
            lvar("v"),
            vec![in_clause(
                pat_alt(pat_value(int(1)), pat_value(int(2))),
                None,
                record(vec![sym("small")]),
            )],
            Some(record(vec![sym("other")])),
        )]);
        let run = run_with(&tree, vec![("v", Value::Int(value))]).unwrap();
        format!("{:?}", run.recorded())
    }

    #[test]
    fn test_guard_reads_pattern_bindings() {
        // case v in [x] if x > 1 then record(x) else record(:small) end
        let tree = seq(vec![case_in(
            lvar("v"),
            vec![in_clause(
                pat_array(vec![pat_bind("x")], None, vec![]),
                Some((call(lvar("x"), ">", vec![int(1)]), false)),
                record(vec![lvar("x")]),
            )],
            Some(record(vec![sym("small")])),
        )]);
        let run = run_with(&tree, vec![("v", Value::ints(&[5]))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::Int(5)]);
        let run = run_with(&tree, vec![("v", Value::ints(&[1]))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::sym("small")]);
    }

    #[test]
    fn test_pin_and_capture() {
        // x = 2; case v in [^x, 3 => y] then record(y) end
        let tree = seq(vec![
            lasgn("x", int(2)),
            case_in(
                lvar("v"),
                vec![in_clause(
                    pat_array(
                        vec![pat_pin(lvar("x")), pat_capture(pat_value(int(3)), "y")],
                        None,
                        vec![],
                    ),
                    None,
                    record(vec![lvar("y")]),
                )],
                Some(record(vec![sym("none")])),
            ),
        ]);
        let run = run_with(&tree, vec![("v", Value::ints(&[2, 3]))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::Int(3)]);
        let run = run_with(&tree, vec![("v", Value::ints(&[1, 3]))]).unwrap();
        assert_eq!(run.recorded(), vec![Value::sym("none")]);
    }

    #[test]
    fn test_unsupported_patterns() {
        let alternation = seq(vec![case_in(
            int(1),
            vec![in_clause(pat_alt(pat_bind("a"), pat_value(int(1))), None, nil())],
            None,
        )]);
        assert!(matches!(
            lower(&alternation),
            Err(CompileError::UnsupportedPattern { .. })
        ));

        let disabled = LowerOptions {
            pattern_matching: false,
            ..LowerOptions::default()
        };
        assert!(matches!(
            lower_with(disabled, &array_pattern_case()),
            Err(CompileError::PatternMatchingDisabled(_))
        ));
    }

    #[test_case("local", "||=", None => "5")]
    #[test_case("local", "||=", Some(1) => "1")]
    #[test_case("local", "&&=", None => "nil")]
    #[test_case("local", "&&=", Some(1) => "5")]
    #[test_case("local", "+=", Some(1) => "6")]
    #[test_case("ivar", "||=", None => "5")]
    #[test_case("ivar", "+=", None => "error: undefined method '+' for nil")]
    #[test_case("gvar", "||=", None => "5")]
    #[test_case("gvar", "||=", Some(1) => "1")]
    #[test_case("gvar", "&&=", Some(1) => "5")]
    #[test_case("cvar", "||=", None => "5")]
    #[test_case("cvar", "||=", Some(1) => "1")]
    #[test_case("cvar", "&&=", None => "error: uninitialized class variable @@x")]
    #[test_case("cvar", "+=", None => "error: uninitialized class variable @@x")]
    #[test_case("cvar", "+=", Some(1) => "6")]
    #[test_case("const", "||=", None => "5")]
    #[test_case("const", "||=", Some(1) => "1")]
    #[test_case("const", "+=", None => "error: uninitialized constant X")]
    fn test_op_assign_definedness(kind: &str, operator: &str, initial: Option<i64>) -> String {
        let target = match kind {
            "local" => OpTarget::Local {
                name: "x".to_string(),
            },
            "ivar" => OpTarget::Instance {
                name: "@x".to_string(),
            },
            "gvar" => OpTarget::Global {
                name: "$x".to_string(),
            },
            "cvar" => OpTarget::ClassVar {
                name: "@@x".to_string(),
            },
            "const" => OpTarget::Constant(const_ref("X")),
            other => panic!("unknown target kind {other}"),
        };
        let operator = match operator {
            "||=" => AssignOperator::Or,
            "&&=" => AssignOperator::And,
            _ => AssignOperator::Binary("+".to_string()),
        };
        let mut statements = vec![];
        if kind == "local"
            && let Some(value) = initial
        {
            statements.push(lasgn("x", int(value)));
        }
        statements.push(op_assign(target, operator, int(5)));
        let unit = lower(&seq(statements)).unwrap();

        let evaluator = Evaluator::new();
        if let Some(value) = initial {
            let value = Value::Int(value);
            match kind {
                "ivar" => evaluator.set_instance_variable("@x", value),
                "gvar" => evaluator.set_global("$x", value),
                "cvar" => evaluator.set_class_variable("@@x", value),
                "const" => evaluator.set_constant("X", value),
                _ => {}
            }
        }
        match evaluator.run(&unit, vec![]) {
            Ok(value) => format!("{value:?}"),
            Err(error) => format!("error: {error}"),
        }
    }

    #[test]
    fn test_index_op_assign_evaluates_receiver_once() {
        // h[:k] ||= 2; h[:k] += 1
        let target = || OpTarget::Index {
            receiver: Box::new(lvar("h")),
            arguments: vec![sym("k")],
        };
        let tree = seq(vec![
            op_assign(target(), AssignOperator::Or, int(2)),
            op_assign(target(), AssignOperator::Binary("+".to_string()), int(1)),
        ]);
        let hash = Value::hash(vec![]);
        let run = run_with(&tree, vec![("h", hash.clone())]).unwrap();
        assert_eq!(run.result, Ok(Value::Int(3)));
        assert_eq!(hash, Value::hash(vec![(Value::sym("k"), Value::Int(3))]));
    }

    #[test]
    fn test_for_loop_writes_enclosing_scope() {
        // for x in [1, 2, 3]; s = x * 2; end; record(x, s)
        let tree = seq(vec![
            for_(
                local_target("x"),
                ints(&[1, 2, 3]),
                lasgn("s", call(lvar("x"), "*", vec![int(2)])),
            ),
            record(vec![lvar("x"), lvar("s")]),
        ]);
        assert_eq!(recorded(&tree), "[3, 6]");
        let unit = lower(&tree).unwrap();
        let mut visible: Vec<_> = unit.frame.visible_names().map(|n| n.to_string()).collect();
        visible.sort();
        assert_eq!(visible, vec!["s", "x"]);
    }

    #[test]
    fn test_flip_flop_state_lives_in_the_script_frame() {
        // [1, 2, 3, 4, 5].each { |i| record(i) if (i == 2)..(i == 4) }
        let body = if_(
            flip_flop(eq(lvar("i"), int(2)), eq(lvar("i"), int(4)), false),
            Some(record(vec![lvar("i")])),
            None,
        );
        let tree = seq(vec![with_block(
            call(ints(&[1, 2, 3, 4, 5]), "each", vec![]),
            block(Some(params().req("i").build()), Some(body), &[]),
        )]);
        assert_eq!(recorded(&tree), "[2, 3, 4]");
        let unit = lower(&tree).unwrap();
        let initialised = count(&unit.body, |n| {
            matches!(n, Node::InitFlipFlopStates(states) if states.len() == 1)
        });
        assert_eq!(initialised, 1);
    }

    #[test_case(2 => "[:low]")]
    #[test_case(4 => "[:mid]")]
    #[test_case(9 => "[:high]")]
    fn test_case_when(value: i64) -> String {
        // case v when 1, 2 then :low when *[3, 4] then :mid else :high end
        let tree = seq(vec![record(vec![case(
            Some(lvar("v")),
            vec![
                (vec![int(1), int(2)], sym("low")),
                (vec![splat(ints(&[3, 4]))], sym("mid")),
            ],
            Some(sym("high")),
        )])]);
        let run = run_with(&tree, vec![("v", Value::Int(value))]).unwrap();
        format!("{:?}", run.recorded())
    }

    #[test]
    fn test_rescue_and_ensure() {
        // begin; raise "boom"; rescue; 1; ensure; record(2); end
        let tree = seq(vec![begin(
            fcall("raise", vec![str("boom")]),
            vec![rescue_clause(vec![], None, int(1))],
            None,
            Some(record(vec![int(2)])),
        )]);
        let run = run(&tree).unwrap();
        assert_eq!(run.result, Ok(Value::Int(1)));
        assert_eq!(run.recorded(), vec![Value::Int(2)]);
    }

    #[test]
    fn test_safe_navigation_skips_nil_receiver() {
        let tree = seq(vec![safe_call(nil(), "missing", vec![])]);
        let run = run(&tree).unwrap();
        assert_eq!(run.result, Ok(Value::Nil));
    }

    #[test]
    fn test_warnings_are_deferred_per_unit() {
        // 1; def m; :a; 2; end; if 3 then nil end
        let tree = seq(vec![
            int(1),
            def("m", None, Some(seq(vec![sym("a"), int(2)])), &[]),
            if_(int(3), Some(nil()), None),
        ]);
        let unit = lower(&tree).unwrap();
        let kinds: Vec<_> = unit.warnings.pending().iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WarningKind::UselessLiteralInVoidContext,
                WarningKind::LiteralInCondition
            ]
        );
        assert_eq!(unit.take_warnings_for_first_execution().len(), 2);
        assert!(unit.take_warnings_for_first_execution().is_empty());

        let method = method_unit(&unit, "m");
        assert_eq!(method.warnings.pending().len(), 1);
    }

    #[test]
    fn test_failed_method_leaves_session_balanced() {
        // if 3 then nil end; def m; if 4 then nil end; break; end
        let mut session = LowerSession::default();
        let broken = seq(vec![
            if_(int(3), Some(nil()), None),
            def(
                "m",
                None,
                Some(seq(vec![if_(int(4), Some(nil()), None), break_(None)])),
                &[],
            ),
        ]);
        assert!(lower_top_level(&mut session, &broken, &[]).is_err());
        assert!(session.begin_unit_warnings().is_empty());

        let clean = seq(vec![if_(int(5), Some(nil()), None)]);
        let unit = lower_top_level(&mut session, &clean, &[]).unwrap();
        assert_eq!(unit.warnings.pending().len(), 1);
    }

    #[test]
    fn test_else_without_rescue_warns() {
        let tree = seq(vec![begin(int(1), vec![], Some(int(2)), None)]);
        let unit = lower(&tree).unwrap();
        assert_eq!(
            unit.warnings.pending()[0].kind,
            WarningKind::ElseWithoutRescue
        );
    }

    #[test]
    fn test_duplicated_when_literal_warns() {
        let tree = seq(vec![case(
            Some(lvar("v")),
            vec![(vec![int(1)], sym("a")), (vec![int(1)], sym("b"))],
            None,
        )]);
        let mut session = LowerSession::default();
        let unit = lower_top_level(&mut session, &tree, &["v"]).unwrap();
        assert_eq!(
            unit.warnings.pending()[0].kind,
            WarningKind::DuplicatedWhenClause
        );
    }

    #[test]
    fn test_cancellation_stops_lowering() {
        garnet_common::tracing::init_test_tracing();
        let flag = CancellationFlag::new();
        let mut session = LowerSession::default().with_cancellation(flag.clone());
        let tree = seq(vec![int(1), int(2)]);
        assert!(lower_top_level(&mut session, &tree, &[]).is_ok());

        flag.cancel();
        assert_eq!(
            lower_top_level(&mut session, &tree, &[]).unwrap_err(),
            CompileError::Cancelled
        );
    }

    #[test]
    fn test_frozen_string_literals() {
        let tree = seq(vec![str("a")]);
        let frozen = |unit: &CompiledUnit| {
            count(&unit.body, |n| matches!(n, Node::StringLiteral { frozen: true, .. }))
        };
        assert_eq!(frozen(&lower(&tree).unwrap()), 0);
        let options = LowerOptions {
            frozen_string_literals: true,
            ..LowerOptions::default()
        };
        assert_eq!(frozen(&lower_with(options, &tree).unwrap()), 1);
    }

    #[test]
    fn test_module_in_block_uses_dynamic_constant_lookup() {
        let module = || module_def("M", Some(constant("X")), &[]);
        let lookups = |tree: &SyntaxNode| {
            let unit = lower(tree).unwrap();
            let mut units = vec![];
            walk(&unit.body, &mut |node| {
                if let Node::ModuleDefinition { body, .. } = node {
                    units.push(body.clone());
                }
            });
            for closure in closures_in(&unit.body) {
                walk(&closure.proc_entry().unwrap().body, &mut |node| {
                    if let Node::ModuleDefinition { body, .. } = node {
                        units.push(body.clone());
                    }
                });
            }
            let mut scopes = vec![];
            walk(&units[0].body, &mut |node| {
                if let Node::ReadConstant { scope, .. } = node {
                    scopes.push(scope.clone());
                }
            });
            scopes
        };

        assert_eq!(
            lookups(&seq(vec![module()])),
            vec![ConstantScope::Lexical { dynamic: false }]
        );
        let in_block = seq(vec![with_block(
            call(ints(&[1]), "each", vec![]),
            block(None, Some(module()), &[]),
        )]);
        assert_eq!(
            lookups(&in_block),
            vec![ConstantScope::Lexical { dynamic: true }]
        );
    }

    #[test]
    fn test_method_body_entry_point() {
        let mut session = LowerSession::default();
        let def = def_node(
            "m",
            Some(params().req("a").opt("b", int(1)).build()),
            Some(lvar("a")),
            &[],
        );
        let unit = crate::lower_method_body(&mut session, &def).unwrap();
        assert_eq!(unit.arity.arity_number(), -2);
        assert_eq!(unit.parameters.len(), 2);

        let evaluator = Evaluator::new();
        assert_eq!(evaluator.run(&unit, vec![Value::Int(4)]), Ok(Value::Int(4)));
    }

    #[test]
    fn test_named_captures_declare_locals() {
        // /(?<year>\d+)-(?<month>\d+)/ =~ s
        let matched = SyntaxNode::new(
            NodeKind::MatchWrite {
                call: Box::new(call(regex("(?<year>\\d+)-(?<month>\\d+)"), "=~", vec![lvar("s")])),
                targets: vec!["year".to_string(), "month".to_string()],
            },
            Span::default(),
        );
        let mut session = LowerSession::default();
        let unit = lower_top_level(&mut session, &seq(vec![matched]), &["s"]).unwrap();
        let visible: Vec<_> = unit.frame.visible_names().map(|n| n.to_string()).collect();
        assert_eq!(visible, vec!["s", "year", "month"]);
    }

    #[test]
    fn test_end_block_registers_once() {
        let end = SyntaxNode::new(
            NodeKind::PostExecution(Some(Box::new(record(vec![int(1)])))),
            Span::default(),
        );
        let tree = seq(vec![end]);
        let unit = lower(&tree).unwrap();
        assert_eq!(count(&unit.body, |n| matches!(n, Node::Once(_))), 1);

        let run = run(&tree).unwrap();
        assert!(matches!(run.result, Ok(Value::Proc(_))));
        assert!(run.recorded().is_empty());
    }

    #[test]
    fn test_json_fixture_lowers_like_the_built_tree() {
        let fixture = r#"{
            "kind": {"statements": [
                {"kind": {"local_write": {"name": "a", "value": {"kind": {"integer": 1}}}},
                 "newline": true},
                {"kind": {"call": {
                    "receiver": {"kind": {"local_read": {"name": "a"}}},
                    "name": "+",
                    "arguments": [{"kind": {"integer": 41}}]
                 }}, "newline": true}
            ]}
        }"#;
        let parsed: SyntaxNode = serde_json::from_str(fixture).unwrap();
        let built = seq(vec![
            lasgn("a", int(1)),
            call(lvar("a"), "+", vec![int(41)]),
        ]);
        assert_eq!(parsed, built);

        let mut first = LowerSession::default();
        let mut second = LowerSession::default();
        let from_json = lower_top_level(&mut first, &parsed, &[]).unwrap();
        let from_builder = lower_top_level(&mut second, &built, &[]).unwrap();
        assert_eq!(from_json.body.to_string(), from_builder.body.to_string());
        assert_eq!(Evaluator::new().run(&from_json, vec![]), Ok(Value::Int(42)));
    }
}
