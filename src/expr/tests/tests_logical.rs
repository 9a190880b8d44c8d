//! Logical operator truth tables, including the null/empty corners.
//!
//! Coverage:
//! - Plain boolean AND / OR / XOR / NOT tables
//! - Plain null collapsing (`null AND false == false`)
//! - Errorful null stickiness (`div-by-zero AND false` stays errorful)
//! - Empty transparency (`empty OR false == empty`, `empty OR true == true`)
//! - Mixed chains in left-associative evaluation order

#[cfg(test)]
mod tests {
    use crate::expr::{ArithOp, Expr, NoColumns};
    use crate::value::Value;

    fn eval(e: Expr) -> Value {
        e.eval(&NoColumns)
    }

    fn vbool(b: bool) -> Expr {
        Expr::constant(b)
    }

    fn vnull() -> Expr {
        Expr::constant(Value::NULL)
    }

    fn vempty() -> Expr {
        Expr::constant(Value::Empty)
    }

    /// `2 / 0` — the canonical errorful-null producer.
    fn div_zero() -> Expr {
        Expr::arith(ArithOp::Div, Expr::constant(2i64), Expr::constant(0i64))
    }

    // ----------------------------------------------------------------
    // Boolean tables
    // ----------------------------------------------------------------

    #[test]
    fn and_or_xor_tables() {
        for (a, b, expected) in [
            (true, true, true),
            (true, false, false),
            (false, true, false),
            (false, false, false),
        ] {
            assert_eq!(eval(Expr::and(vbool(a), vbool(b))), Value::Bool(expected));
        }
        for (a, b, expected) in [
            (true, true, true),
            (true, false, true),
            (false, true, true),
            (false, false, false),
        ] {
            assert_eq!(eval(Expr::or(vbool(a), vbool(b))), Value::Bool(expected));
        }
        for (a, b, expected) in [
            (true, true, false),
            (true, false, true),
            (false, true, true),
            (false, false, false),
        ] {
            assert_eq!(eval(Expr::xor(vbool(a), vbool(b))), Value::Bool(expected));
        }
    }

    #[test]
    fn not_table() {
        assert_eq!(eval(Expr::not(vbool(true))), Value::Bool(false));
        assert_eq!(eval(Expr::not(vbool(false))), Value::Bool(true));
        assert_eq!(eval(Expr::not(vnull())), Value::NULL);
        assert_eq!(eval(Expr::not(vempty())), Value::Empty);
        assert_eq!(eval(Expr::not(div_zero())), Value::DIV_BY_ZERO);
    }

    /// Left-associative chains match the scalar tables.
    #[test]
    fn chained_booleans() {
        // true AND true OR false
        let e = Expr::or(Expr::and(vbool(true), vbool(true)), vbool(false));
        assert_eq!(eval(e), Value::Bool(true));
        // true OR false AND true OR false  ==  (true OR false) AND ... built
        // explicitly left-to-right with AND binding tighter:
        let e = Expr::or(
            Expr::or(vbool(true), Expr::and(vbool(false), vbool(true))),
            vbool(false),
        );
        assert_eq!(eval(e), Value::Bool(true));
        // true XOR true XOR false
        let e = Expr::xor(Expr::xor(vbool(true), vbool(true)), vbool(false));
        assert_eq!(eval(e), Value::Bool(false));
    }

    // ----------------------------------------------------------------
    // Plain null
    // ----------------------------------------------------------------

    #[test]
    fn plain_null_and() {
        assert_eq!(eval(Expr::and(vnull(), vbool(true))), Value::NULL);
        assert_eq!(eval(Expr::and(vbool(true), vnull())), Value::NULL);
        assert_eq!(eval(Expr::and(vnull(), vnull())), Value::NULL);
        // Plain null collapses against a definite false.
        assert_eq!(eval(Expr::and(vnull(), vbool(false))), Value::Bool(false));
        assert_eq!(eval(Expr::and(vbool(false), vnull())), Value::Bool(false));
    }

    #[test]
    fn plain_null_or() {
        assert_eq!(eval(Expr::or(vnull(), vbool(false))), Value::NULL);
        assert_eq!(eval(Expr::or(vbool(false), vnull())), Value::NULL);
        assert_eq!(eval(Expr::or(vnull(), vnull())), Value::NULL);
        // Definite true wins.
        assert_eq!(eval(Expr::or(vnull(), vbool(true))), Value::Bool(true));
        assert_eq!(eval(Expr::or(vbool(true), vnull())), Value::Bool(true));
    }

    #[test]
    fn plain_null_xor() {
        assert_eq!(eval(Expr::xor(vnull(), vbool(true))), Value::NULL);
        assert_eq!(eval(Expr::xor(vnull(), vbool(false))), Value::NULL);
        assert_eq!(eval(Expr::xor(vbool(true), vnull())), Value::NULL);
        assert_eq!(eval(Expr::xor(vbool(false), vnull())), Value::NULL);
        assert_eq!(eval(Expr::xor(vnull(), vnull())), Value::NULL);
    }

    // ----------------------------------------------------------------
    // Errorful null stickiness
    // ----------------------------------------------------------------

    #[test]
    fn div_by_zero_sticks_through_and() {
        assert_eq!(eval(div_zero()), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::and(div_zero(), vbool(true))), Value::DIV_BY_ZERO);
        // Unlike plain null, the errorful null survives a definite false on
        // the right.
        assert_eq!(eval(Expr::and(div_zero(), vbool(false))), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::and(vbool(true), div_zero())), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::and(div_zero(), div_zero())), Value::DIV_BY_ZERO);
        // A definite false on the *left* still short-circuits: the rhs is
        // never evaluated.
        assert_eq!(eval(Expr::and(vbool(false), div_zero())), Value::Bool(false));
    }

    #[test]
    fn div_by_zero_sticks_through_or() {
        assert_eq!(eval(Expr::or(div_zero(), vbool(true))), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::or(div_zero(), vbool(false))), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::or(vbool(false), div_zero())), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::or(div_zero(), div_zero())), Value::DIV_BY_ZERO);
        // Definite true on the left short-circuits.
        assert_eq!(eval(Expr::or(vbool(true), div_zero())), Value::Bool(true));
    }

    #[test]
    fn div_by_zero_sticks_through_xor() {
        assert_eq!(eval(Expr::xor(div_zero(), vbool(true))), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::xor(div_zero(), vbool(false))), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::xor(vbool(true), div_zero())), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::xor(vbool(false), div_zero())), Value::DIV_BY_ZERO);
        assert_eq!(eval(Expr::xor(div_zero(), div_zero())), Value::DIV_BY_ZERO);
    }

    /// `empty AND null AND 2/0 AND empty` — severity escalates left to
    /// right and the errorful null wins the chain.
    #[test]
    fn severity_escalates_in_chain() {
        let e = Expr::and(
            Expr::and(Expr::and(vempty(), vnull()), div_zero()),
            vempty(),
        );
        assert_eq!(eval(e), Value::DIV_BY_ZERO);
    }

    // ----------------------------------------------------------------
    // Empty transparency
    // ----------------------------------------------------------------

    #[test]
    fn empty_and() {
        assert_eq!(eval(Expr::and(vempty(), vbool(true))), Value::Empty);
        assert_eq!(eval(Expr::and(vbool(true), vempty())), Value::Empty);
        assert_eq!(eval(Expr::and(vempty(), vempty())), Value::Empty);
        // A definite false wins from either side.
        assert_eq!(eval(Expr::and(vempty(), vbool(false))), Value::Bool(false));
        assert_eq!(eval(Expr::and(vbool(false), vempty())), Value::Bool(false));
        // Null outranks empty.
        assert_eq!(eval(Expr::and(vempty(), vnull())), Value::NULL);
        assert_eq!(eval(Expr::and(vnull(), vempty())), Value::NULL);
    }

    #[test]
    fn empty_or() {
        assert_eq!(eval(Expr::or(vempty(), vbool(false))), Value::Empty);
        assert_eq!(eval(Expr::or(vbool(false), vempty())), Value::Empty);
        assert_eq!(eval(Expr::or(vempty(), vempty())), Value::Empty);
        assert_eq!(eval(Expr::or(vempty(), vbool(true))), Value::Bool(true));
        assert_eq!(eval(Expr::or(vbool(true), vempty())), Value::Bool(true));
        assert_eq!(eval(Expr::or(vempty(), vnull())), Value::NULL);
        assert_eq!(eval(Expr::or(vnull(), vempty())), Value::NULL);
    }

    #[test]
    fn empty_xor() {
        assert_eq!(eval(Expr::xor(vempty(), vbool(true))), Value::Empty);
        assert_eq!(eval(Expr::xor(vempty(), vbool(false))), Value::Empty);
        assert_eq!(eval(Expr::xor(vbool(true), vempty())), Value::Empty);
        assert_eq!(eval(Expr::xor(vbool(false), vempty())), Value::Empty);
        assert_eq!(eval(Expr::xor(vempty(), vempty())), Value::Empty);
        assert_eq!(eval(Expr::xor(vempty(), vnull())), Value::NULL);
        assert_eq!(eval(Expr::xor(vnull(), vempty())), Value::NULL);
    }

    /// `empty AND true AND empty` and `empty OR false OR empty` stay empty.
    #[test]
    fn empty_chains() {
        let e = Expr::and(Expr::and(vempty(), vbool(true)), vempty());
        assert_eq!(eval(e), Value::Empty);

        let e = Expr::or(Expr::or(vempty(), vbool(false)), vempty());
        assert_eq!(eval(e), Value::Empty);

        let e = Expr::xor(Expr::xor(vbool(true), vempty()), vbool(false));
        assert_eq!(eval(e), Value::Empty);
    }
}
