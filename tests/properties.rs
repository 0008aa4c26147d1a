//! Property-based tests for the type lattice and the parser front door.

use std::rc::Rc;

use proptest::prelude::*;

use tesselc::types::{SmartKind, Type};
use tesselc::{check, lexer, parse, Reporter};

/// Strategy over arbitrary resolved types, a few levels deep.
fn arb_type() -> impl Strategy<Value = Rc<Type>> {
    let leaf = prop_oneof![
        Just(Type::void()),
        Just(Type::int()),
        Just(Type::float()),
        Just(Type::bool()),
        Just(Type::string()),
        Just(Type::error()),
        "[A-Z][a-z]{0,6}".prop_map(Type::named),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(Type::array),
            (inner.clone(), any::<bool>()).prop_map(|(t, u)| Type::pointer(t, u)),
            inner.clone().prop_map(Type::reference),
            (inner.clone(), prop::collection::vec(inner.clone(), 0..3))
                .prop_map(|(ret, params)| Type::function(ret, params)),
            (
                inner.clone(),
                prop_oneof![
                    Just(SmartKind::Shared),
                    Just(SmartKind::Unique),
                    Just(SmartKind::Weak)
                ]
            )
                .prop_map(|(t, k)| Type::smart(t, k)),
            (inner.clone(), inner).prop_map(|(a, b)| Type::union(a, b)),
        ]
    })
}

proptest! {
    #[test]
    fn assignability_is_reflexive(ty in arb_type()) {
        prop_assert!(ty.is_assignable_to(&ty));
    }

    #[test]
    fn structural_equality_implies_mutual_assignability(a in arb_type(), b in arb_type()) {
        if a == b {
            prop_assert!(a.is_assignable_to(&b));
            prop_assert!(b.is_assignable_to(&a));
        }
    }

    #[test]
    fn error_is_assignable_both_ways(ty in arb_type()) {
        let error = Type::error();
        prop_assert!(error.is_assignable_to(&ty));
        prop_assert!(ty.is_assignable_to(&error));
    }

    #[test]
    fn union_components_commute(a in arb_type(), b in arb_type()) {
        let ab = Type::union(a.clone(), b.clone());
        let ba = Type::union(b, a);
        prop_assert_eq!(&*ab, &*ba);
    }

    #[test]
    fn anything_assignable_to_a_component_reaches_the_union(
        a in arb_type(),
        b in arb_type(),
        c in arb_type(),
    ) {
        let union = Type::union(a.clone(), b.clone());
        if c.is_assignable_to(&a) || c.is_assignable_to(&b) {
            prop_assert!(c.is_assignable_to(&union));
        }
    }

    #[test]
    fn assignability_implies_implicit_implies_explicit(a in arb_type(), b in arb_type()) {
        if a.is_assignable_to(&b) {
            prop_assert!(a.is_implicitly_convertible_to(&b));
        }
        if a.is_implicitly_convertible_to(&b) {
            prop_assert!(a.is_explicitly_convertible_to(&b));
        }
    }

    #[test]
    fn function_variance(
        ret_narrow in arb_type(),
        param_wide in arb_type(),
        extra in arb_type(),
    ) {
        // If A <: B then (wide) -> A  <:  (narrow) -> B pointwise: the
        // lattice must respect covariant returns and contravariant
        // parameters for same-arity signatures.
        let wide_ret = Type::union(ret_narrow.clone(), extra.clone());
        let narrow_param = param_wide.clone();
        let param_wider = Type::union(param_wide, extra);

        let sub = Type::function(ret_narrow, vec![param_wider.clone()]);
        let sup = Type::function(wide_ret, vec![narrow_param]);
        prop_assert!(sub.is_assignable_to(&sup));
    }

    #[test]
    fn arity_mismatch_never_assigns(a in arb_type(), b in arb_type()) {
        let unary = Type::function(a.clone(), vec![b.clone()]);
        let nullary = Type::function(a, vec![]);
        if !unary.is_error() {
            prop_assert!(!unary.is_assignable_to(&nullary));
            prop_assert!(!nullary.is_assignable_to(&unary));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// The front end must never panic, whatever bytes arrive.
    #[test]
    fn lex_parse_check_never_panic(source in ".{0,200}") {
        let mut reporter = Reporter::new();
        let tokens = lexer::lex(&source, "fuzz.tsl", &mut reporter);
        let program = parse(tokens, &mut reporter);
        let _ = check(&program, &mut reporter);
    }

    /// Simple well-typed arithmetic always checks, and a second
    /// independent walk agrees with the first.
    #[test]
    fn well_typed_arithmetic_checks_twice(
        a in 0i32..1000,
        b in 1i32..1000,
        op in prop_oneof![Just("+"), Just("-"), Just("*"), Just("/"), Just("%")],
    ) {
        let source = format!("let x: int = {a} {op} {b};");
        let mut reporter = Reporter::new();
        let tokens = lexer::lex(&source, "gen.tsl", &mut reporter);
        let program = parse(tokens, &mut reporter);
        prop_assert!(!reporter.has_errors());
        prop_assert!(check(&program, &mut reporter));
        prop_assert!(check(&program, &mut reporter));
    }
}
