//! Declarative macros for gauge families

/// Define a gauge family enum carrying each gauge's metric name and help text
///
/// # Example
/// ```
/// use streamcache::metric_enum;
///
/// metric_enum! {
///     pub enum LaneMetric {
///         BlocksFree => ("streamcache_lane_blocks_free", "Free blocks in the lane buffer"),
///         BlocksQueued => ("streamcache_lane_blocks_queued", "Blocks waiting for the host"),
///     }
/// }
///
/// let metric = LaneMetric::BlocksFree;
/// assert_eq!(metric.name(), "streamcache_lane_blocks_free");
/// assert_eq!(metric.help(), "Free blocks in the lane buffer");
/// assert_eq!(LaneMetric::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! metric_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => ($metric:literal, $help:literal)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            /// Every variant in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// Prometheus metric name
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $metric,)*
                }
            }

            /// Prometheus help text
            pub fn help(&self) -> &'static str {
                match self {
                    $($name::$variant => $help,)*
                }
            }
        }
    };
}
