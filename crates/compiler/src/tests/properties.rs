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

//! Properties of argument binding and multiple assignment, checked by running lowered code.

use garnet_syntax::build::*;
use proptest::prelude::*;

use super::generators::{Signature, arb_call, arb_signature, arb_values};
use crate::arity_of;
use crate::testing::{Value, run};

/// What each parameter should hold after binding `given` arguments `1..=given`, or the
/// arity error the call should fail with.
fn expected_binding(signature: &Signature, given: usize) -> Result<Vec<Value>, String> {
    let too_many = !signature.rest && given > signature.required() + signature.optional;
    if given < signature.required() || too_many {
        return Err(format!(
            "wrong number of arguments (given {given}, expected {})",
            signature.required()
        ));
    }
    let arguments: Vec<i64> = (1..=given as i64).collect();
    let filled = (given - signature.required()).min(signature.optional);
    let rest_len = given - signature.required() - filled;

    let mut values: Vec<Value> = arguments[..signature.pre]
        .iter()
        .map(|a| Value::Int(*a))
        .collect();
    let mut cursor = signature.pre;
    for i in 0..signature.optional {
        if i < filled {
            values.push(Value::Int(arguments[cursor]));
            cursor += 1;
        } else {
            values.push(Value::Int(Signature::default_of(i)));
        }
    }
    if signature.rest {
        values.push(Value::ints(&arguments[cursor..cursor + rest_len]));
        cursor += rest_len;
    }
    values.extend(arguments[cursor..].iter().map(|a| Value::Int(*a)));
    Ok(values)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn positional_binding_matches_model((signature, given) in arb_call()) {
        let tree = seq(vec![
            def(
                "m",
                Some(signature.parameters()),
                Some(fcall("record", vec![array(signature.reads())])),
                &[],
            ),
            fcall("m", (1..=given as i64).map(int).collect()),
        ]);
        let run = run(&tree).map_err(|e| TestCaseError::fail(e.to_string()))?;
        match expected_binding(&signature, given) {
            Ok(values) => {
                prop_assert!(run.result.is_ok(), "{:?}", run.result);
                prop_assert_eq!(run.recorded(), vec![Value::array(values)]);
            }
            Err(message) => prop_assert_eq!(run.result, Err(message)),
        }
    }

    #[test]
    fn arity_accepts_exactly_the_bindable_counts(signature in arb_signature(), given in 0..8usize) {
        let arity = arity_of(Some(&signature.parameters()));
        prop_assert_eq!(arity.accepts(given), expected_binding(&signature, given).is_ok());
    }

    #[test]
    fn split_assignment_reassembles(values in arb_values()) {
        // a, *b, c = values
        let tree = seq(vec![
            masgn(
                locals_target(&["a"], Some("b"), &["c"]),
                array(values.iter().map(|v| int(*v)).collect()),
            ),
            fcall("record", vec![lvar("a"), lvar("b"), lvar("c")]),
        ]);
        let run = run(&tree).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let recorded = run.recorded();
        prop_assert_eq!(recorded.len(), 3);
        let Value::Array(middle) = &recorded[1] else {
            return Err(TestCaseError::fail("rest is not an array"));
        };
        let mut reassembled = vec![recorded[0].clone()];
        reassembled.extend(middle.borrow().iter().cloned());
        reassembled.push(recorded[2].clone());
        prop_assert_eq!(Value::array(reassembled), Value::ints(&values));
    }
}
