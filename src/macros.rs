pub use enclose::*;

/// Defines a derived node on a graph. Captured handles are cloned into
/// the resolver and again into every evaluation.
///
/// ```ignore
/// let results = computed!(graph, (client) cx => {
///     let term = cx.get_or_default(search);
///     client.sounds_like(&term).await
/// });
/// ```
#[macro_export]
macro_rules! computed {
    ($graph:expr, ( $($d_tt:tt)* ) $cx:ident => $($b:tt)*) => {
        $graph.computed($crate::macros::enclose!(($( $d_tt )*) move |$cx: $crate::Context| {
            $crate::macros::enclose!(($( $d_tt )*) async move { $($b)* })
        }))
    };
    ($graph:expr, $cx:ident => $($b:tt)*) => {
        $graph.computed(move |$cx: $crate::Context| async move { $($b)* })
    };
}

/// Same as [`computed!`] for resolvers returning a `Result`.
#[macro_export]
macro_rules! try_computed {
    ($graph:expr, ( $($d_tt:tt)* ) $cx:ident => $($b:tt)*) => {
        $graph.try_computed($crate::macros::enclose!(($( $d_tt )*) move |$cx: $crate::Context| {
            $crate::macros::enclose!(($( $d_tt )*) async move { $($b)* })
        }))
    };
    ($graph:expr, $cx:ident => $($b:tt)*) => {
        $graph.try_computed(move |$cx: $crate::Context| async move { $($b)* })
    };
}
