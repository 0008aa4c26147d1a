use std::fmt;
use std::rc::Rc;

/// Ownership discipline of a smart pointer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartKind {
    Shared,
    Unique,
    Weak,
}

/// A fully resolved type, produced by the checker and consumed by the
/// lowerer.
///
/// Values are immutable and shared through `Rc`; comparison is structural.
/// `Error` is the zero-propagating sentinel: every predicate involving it
/// answers "true" so a single failure does not cascade into follow-on
/// diagnostics.
#[derive(Debug)]
pub enum Type {
    Void,
    Int {
        /// Set only for the literal `0`, which doubles as the null pointer
        /// constant. Ignored by equality.
        literal_zero: bool,
    },
    Float,
    Bool,
    String,
    Named(std::string::String),
    Array(Rc<Type>),
    Pointer {
        pointee: Rc<Type>,
        is_unsafe: bool,
    },
    Reference(Rc<Type>),
    Function {
        ret: Rc<Type>,
        params: Vec<Rc<Type>>,
    },
    Smart {
        pointee: Rc<Type>,
        kind: SmartKind,
    },
    Union(Rc<Type>, Rc<Type>),
    Template {
        name: std::string::String,
        args: Vec<Rc<Type>>,
    },
    Error,
}

thread_local! {
    static VOID: Rc<Type> = Rc::new(Type::Void);
    static INT: Rc<Type> = Rc::new(Type::Int { literal_zero: false });
    static INT_ZERO: Rc<Type> = Rc::new(Type::Int { literal_zero: true });
    static FLOAT: Rc<Type> = Rc::new(Type::Float);
    static BOOL: Rc<Type> = Rc::new(Type::Bool);
    static STRING: Rc<Type> = Rc::new(Type::String);
    static ERROR: Rc<Type> = Rc::new(Type::Error);
}

impl Type {
    // The primitives and the error sentinel are interned; everything the
    // checker hands out for `int` is the same allocation.
    pub fn void() -> Rc<Type> {
        VOID.with(Rc::clone)
    }

    pub fn int() -> Rc<Type> {
        INT.with(Rc::clone)
    }

    pub fn int_literal_zero() -> Rc<Type> {
        INT_ZERO.with(Rc::clone)
    }

    pub fn float() -> Rc<Type> {
        FLOAT.with(Rc::clone)
    }

    pub fn bool() -> Rc<Type> {
        BOOL.with(Rc::clone)
    }

    pub fn string() -> Rc<Type> {
        STRING.with(Rc::clone)
    }

    pub fn error() -> Rc<Type> {
        ERROR.with(Rc::clone)
    }

    pub fn named(name: impl Into<std::string::String>) -> Rc<Type> {
        Rc::new(Type::Named(name.into()))
    }

    pub fn array(element: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::Array(element))
    }

    pub fn pointer(pointee: Rc<Type>, is_unsafe: bool) -> Rc<Type> {
        Rc::new(Type::Pointer { pointee, is_unsafe })
    }

    pub fn reference(target: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::Reference(target))
    }

    pub fn function(ret: Rc<Type>, params: Vec<Rc<Type>>) -> Rc<Type> {
        Rc::new(Type::Function { ret, params })
    }

    pub fn smart(pointee: Rc<Type>, kind: SmartKind) -> Rc<Type> {
        Rc::new(Type::Smart { pointee, kind })
    }

    pub fn union(left: Rc<Type>, right: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::Union(left, right))
    }

    pub fn template(name: impl Into<std::string::String>, args: Vec<Rc<Type>>) -> Rc<Type> {
        Rc::new(Type::Template {
            name: name.into(),
            args,
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int { .. } | Type::Float)
    }

    pub fn is_literal_zero(&self) -> bool {
        matches!(self, Type::Int { literal_zero: true })
    }

    /// The target may accept `self` without any conversion.
    pub fn is_assignable_to(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        if self.is_error() || other.is_error() {
            return true;
        }
        if let Type::Union(left, right) = other {
            return self.is_assignable_to(left) || self.is_assignable_to(right);
        }
        if self.is_int() && matches!(other, Type::Float) {
            return true;
        }
        // Only the literal `0` doubles as the null pointer constant.
        if matches!(other, Type::Pointer { .. }) && self.is_literal_zero() {
            return true;
        }
        match (self, other) {
            (
                Type::Smart { pointee: a, kind: ka },
                Type::Smart { pointee: b, kind: kb },
            ) => {
                if ka == kb {
                    return a.is_assignable_to(b);
                }
                // A shared pointer may be observed through a weak one.
                if *ka == SmartKind::Shared && *kb == SmartKind::Weak {
                    return a.is_assignable_to(b);
                }
                false
            }
            (Type::Array(a), Type::Array(b)) => a.is_assignable_to(b),
            (
                Type::Function { ret: ra, params: pa },
                Type::Function { ret: rb, params: pb },
            ) => {
                // Covariant return, contravariant parameters, same arity.
                if !ra.is_assignable_to(rb) {
                    return false;
                }
                if pa.len() != pb.len() {
                    return false;
                }
                pa.iter().zip(pb).all(|(a, b)| b.is_assignable_to(a))
            }
            _ => false,
        }
    }

    /// Assignability plus the conversions the language performs silently.
    pub fn is_implicitly_convertible_to(&self, other: &Type) -> bool {
        if self.is_assignable_to(other) {
            return true;
        }
        if matches!(other, Type::Bool) {
            return matches!(
                self,
                Type::Int { .. } | Type::Float | Type::Pointer { .. } | Type::Smart { .. }
            );
        }
        false
    }

    /// Everything reachable through an explicit `cast<T>`.
    pub fn is_explicitly_convertible_to(&self, other: &Type) -> bool {
        if self.is_implicitly_convertible_to(other) {
            return true;
        }
        match (self, other) {
            (Type::Float, Type::Int { .. }) | (Type::Int { .. }, Type::Float) => true,
            (Type::Int { .. } | Type::Float | Type::Bool, Type::String) => true,
            (Type::Pointer { .. }, Type::Pointer { .. }) => true,
            (Type::Pointer { .. }, Type::Int { .. }) => true,
            (Type::Int { .. }, Type::Pointer { .. }) => true,
            (Type::Smart { .. }, Type::Smart { .. }) => true,
            (Type::Smart { .. }, Type::Pointer { .. }) => true,
            (Type::Pointer { .. }, Type::Smart { .. }) => true,
            (_, Type::Union(left, right)) => {
                self.is_explicitly_convertible_to(left) || self.is_explicitly_convertible_to(right)
            }
            (Type::Union(left, right), _) => {
                left.is_explicitly_convertible_to(other)
                    || right.is_explicitly_convertible_to(other)
            }
            _ => false,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Void, Type::Void)
            | (Type::Float, Type::Float)
            | (Type::Bool, Type::Bool)
            | (Type::String, Type::String)
            | (Type::Error, Type::Error) => true,
            // The literal-zero marker does not participate in equality.
            (Type::Int { .. }, Type::Int { .. }) => true,
            (Type::Named(a), Type::Named(b)) => a == b,
            (Type::Array(a), Type::Array(b)) => a == b,
            (
                Type::Pointer { pointee: a, is_unsafe: ua },
                Type::Pointer { pointee: b, is_unsafe: ub },
            ) => a == b && ua == ub,
            (Type::Reference(a), Type::Reference(b)) => a == b,
            (
                Type::Function { ret: ra, params: pa },
                Type::Function { ret: rb, params: pb },
            ) => ra == rb && pa == pb,
            (
                Type::Smart { pointee: a, kind: ka },
                Type::Smart { pointee: b, kind: kb },
            ) => a == b && ka == kb,
            // A|B equals B|A.
            (Type::Union(al, ar), Type::Union(bl, br)) => {
                (al == bl && ar == br) || (al == br && ar == bl)
            }
            (
                Type::Template { name: na, args: aa },
                Type::Template { name: nb, args: ab },
            ) => na == nb && aa == ab,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Int { .. } => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::Bool => f.write_str("bool"),
            Type::String => f.write_str("string"),
            Type::Named(name) => f.write_str(name),
            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::Pointer { pointee, is_unsafe } => {
                if *is_unsafe {
                    write!(f, "{pointee}@unsafe")
                } else {
                    write!(f, "{pointee}@")
                }
            }
            Type::Reference(target) => write!(f, "{target}&"),
            Type::Function { ret, params } => {
                f.write_str("function(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, "): {ret}")
            }
            Type::Smart { pointee, kind } => {
                let prefix = match kind {
                    SmartKind::Shared => "#shared",
                    SmartKind::Unique => "#unique",
                    SmartKind::Weak => "#weak",
                };
                write!(f, "{prefix}<{pointee}>")
            }
            Type::Union(left, right) => write!(f, "{left} | {right}"),
            Type::Template { name, args } => {
                write!(f, "{name}<")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(">")
            }
            Type::Error => f.write_str("error_type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_is_assignable_to_itself() {
        let samples = [
            Type::void(),
            Type::int(),
            Type::float(),
            Type::bool(),
            Type::string(),
            Type::named("Widget"),
            Type::array(Type::int()),
            Type::pointer(Type::float(), false),
            Type::reference(Type::int()),
            Type::function(Type::int(), vec![Type::int(), Type::float()]),
            Type::smart(Type::named("Node"), SmartKind::Shared),
            Type::union(Type::int(), Type::string()),
            Type::template("Box", vec![Type::int()]),
            Type::error(),
        ];
        for ty in &samples {
            assert!(ty.is_assignable_to(ty), "{ty} not reflexive");
        }
    }

    #[test]
    fn error_is_top_and_bottom() {
        let int = Type::int();
        let err = Type::error();
        assert!(err.is_assignable_to(&int));
        assert!(int.is_assignable_to(&err));
    }

    #[test]
    fn int_widens_to_float_but_not_back() {
        assert!(Type::int().is_assignable_to(&Type::float()));
        assert!(!Type::float().is_assignable_to(&Type::int()));
    }

    #[test]
    fn only_literal_zero_is_a_null_pointer() {
        let ptr = Type::pointer(Type::int(), false);
        assert!(Type::int_literal_zero().is_assignable_to(&ptr));
        assert!(!Type::int().is_assignable_to(&ptr));
    }

    #[test]
    fn literal_zero_compares_equal_to_int() {
        assert_eq!(&*Type::int_literal_zero(), &*Type::int());
    }

    #[test]
    fn arrays_are_covariant() {
        let ints = Type::array(Type::int());
        let floats = Type::array(Type::float());
        assert!(ints.is_assignable_to(&floats));
        assert!(!floats.is_assignable_to(&ints));
    }

    #[test]
    fn union_is_symmetric_and_absorbs_components() {
        let a = Type::union(Type::int(), Type::string());
        let b = Type::union(Type::string(), Type::int());
        assert_eq!(&*a, &*b);
        assert!(Type::int().is_assignable_to(&a));
        assert!(Type::string().is_assignable_to(&a));
        assert!(!Type::bool().is_assignable_to(&a));
    }

    #[test]
    fn function_variance() {
        // (float) -> int  is assignable to  (int) -> float:
        // covariant return, contravariant parameter.
        let sub = Type::function(Type::int(), vec![Type::float()]);
        let sup = Type::function(Type::float(), vec![Type::int()]);
        assert!(sub.is_assignable_to(&sup));
        assert!(!sup.is_assignable_to(&sub));

        let unary = Type::function(Type::int(), vec![Type::int()]);
        let binary = Type::function(Type::int(), vec![Type::int(), Type::int()]);
        assert!(!unary.is_assignable_to(&binary));
    }

    #[test]
    fn smart_pointer_rules() {
        let node = Type::named("Node");
        let shared = Type::smart(node.clone(), SmartKind::Shared);
        let weak = Type::smart(node.clone(), SmartKind::Weak);
        let unique = Type::smart(node, SmartKind::Unique);
        assert!(shared.is_assignable_to(&weak));
        assert!(!weak.is_assignable_to(&shared));
        assert!(!shared.is_assignable_to(&unique));
        assert!(!unique.is_assignable_to(&shared));
    }

    #[test]
    fn implicit_conversions_reach_bool() {
        assert!(Type::int().is_implicitly_convertible_to(&Type::bool()));
        assert!(Type::float().is_implicitly_convertible_to(&Type::bool()));
        assert!(Type::pointer(Type::int(), false).is_implicitly_convertible_to(&Type::bool()));
        assert!(Type::smart(Type::int(), SmartKind::Unique)
            .is_implicitly_convertible_to(&Type::bool()));
        assert!(!Type::string().is_implicitly_convertible_to(&Type::bool()));
    }

    #[test]
    fn explicit_conversions() {
        assert!(Type::float().is_explicitly_convertible_to(&Type::int()));
        assert!(Type::int().is_explicitly_convertible_to(&Type::string()));
        assert!(!Type::string().is_explicitly_convertible_to(&Type::int()));
        let p1 = Type::pointer(Type::int(), false);
        let p2 = Type::pointer(Type::named("Widget"), true);
        assert!(p1.is_explicitly_convertible_to(&p2));
        assert!(p1.is_explicitly_convertible_to(&Type::int()));
        assert!(Type::int().is_explicitly_convertible_to(&p1));
        let shared = Type::smart(Type::int(), SmartKind::Shared);
        let unique = Type::smart(Type::int(), SmartKind::Unique);
        assert!(shared.is_explicitly_convertible_to(&unique));
        assert!(shared.is_explicitly_convertible_to(&p1));
        // Distribution over union components, both sides.
        let u = Type::union(Type::int(), Type::string());
        assert!(Type::float().is_explicitly_convertible_to(&u));
        assert!(u.is_explicitly_convertible_to(&Type::float()));
    }

    #[test]
    fn pointer_unsafety_is_part_of_identity() {
        let safe = Type::pointer(Type::int(), false);
        let unsafe_ = Type::pointer(Type::int(), true);
        assert_ne!(&*safe, &*unsafe_);
        // But an explicit cast between them is allowed.
        assert!(safe.is_explicitly_convertible_to(&unsafe_));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Type::array(Type::int()).to_string(), "int[]");
        assert_eq!(Type::pointer(Type::float(), true).to_string(), "float@unsafe");
        assert_eq!(
            Type::function(Type::void(), vec![Type::int(), Type::bool()]).to_string(),
            "function(int, bool): void"
        );
        assert_eq!(
            Type::smart(Type::named("Node"), SmartKind::Weak).to_string(),
            "#weak<Node>"
        );
        assert_eq!(
            Type::union(Type::int(), Type::string()).to_string(),
            "int | string"
        );
    }
}
