#[macro_export]
macro_rules! shape {
    (? $param:ident) => {
        $crate::Shape::param(stringify!($param))
    };
    ($head:ident [ $($arg:expr),+ $(,)? ]) => {
        $crate::Shape::apply(stringify!($head), vec![$($arg),+])
    };
    ($head:ident) => {
        $crate::Shape::atom(stringify!($head))
    };
}

#[macro_export]
macro_rules! rule {
    (
        name: $name:expr,
        consequent: $consequent:expr,
        antecedents: [ $($ante:expr),* $(,)? ],
        build: |$args:ident| -> $ret:ty $body:block
        $(,)?
    ) => {
        $crate::Rule {
            name: $name,
            consequent: $consequent,
            antecedents: vec![$($ante),*],
            build: Box::new(move |$args: &[$crate::Value]| {
                use $crate::IntoDerived;
                let result: $ret = $body;
                result.map(|v| v.into_derived())
            }),
        }
    };
}

#[macro_export]
macro_rules! fact {
    (name: $name:expr, shape: $shape:expr, value: $v:expr $(,)?) => {{
        let shared: $crate::Value = $crate::value($v);
        $crate::Rule {
            name: $name,
            consequent: $shape,
            antecedents: vec![],
            build: Box::new(move |_args: &[$crate::Value]| Ok($crate::Derived::of(shared.clone()))),
        }
    }};
}

#[macro_export]
macro_rules! defer {
    // Identity form: the stand-in is the handle itself; the consuming rule
    // downcasts to `Deferred` and dereferences after construction.
    (name: $name:expr, shape: $shape:expr $(,)?) => {
        $crate::Rule {
            name: $name,
            consequent: $crate::Shape::deferred($shape),
            antecedents: vec![],
            build: Box::new(move |args: &[$crate::Value]| {
                let handle = args.first().ok_or_else(|| {
                    $crate::BuildError::new("deferred-handle rule invoked without a handle")
                })?;
                Ok($crate::Derived::of(handle.clone()))
            }),
        }
    };
    // Wrapping form: build a shape-specific lazy stand-in from the handle.
    (name: $name:expr, shape: $shape:expr, wrap: |$handle:ident| -> $ret:ty $body:block $(,)?) => {
        $crate::Rule {
            name: $name,
            consequent: $crate::Shape::deferred($shape),
            antecedents: vec![],
            build: Box::new(move |args: &[$crate::Value]| {
                use $crate::IntoDerived;
                let $handle: $crate::Deferred = args
                    .first()
                    .and_then(|v| v.downcast_ref::<$crate::Deferred>())
                    .cloned()
                    .ok_or_else(|| {
                        $crate::BuildError::new("deferred-handle rule invoked without a handle")
                    })?;
                let result: $ret = $body;
                result.map(|v| v.into_derived())
            }),
        }
    };
}
