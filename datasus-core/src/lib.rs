//! DATASUS Core: the pieces one extraction run is built from.
//!
//! - Target period selection and filename suffixes
//! - Run gate (one full run per period)
//! - Run log with checkpoint flushes
//! - Remote source, format converter and notifier traits
//! - DBC decompression, DBF reading and CSV writing
//! - Run manifest sidecar

pub mod clock;
pub mod convert;
pub mod gate;
pub mod layout;
pub mod manifest;
pub mod notify;
pub mod period;
pub mod remote;
pub mod run_log;

pub use clock::{Clock, FixedClock, SystemClock};
pub use convert::{ConvertError, DbcConverter, FormatConverter, Table};
pub use gate::{GateError, GateState, GateStatus, RunGate};
pub use layout::{Layout, LayoutConfig};
pub use manifest::{ConvertedFile, RunManifest};
pub use notify::{DisabledNotifier, Notifier, NotifyError, Report, ReportTemplate};
pub use period::{Period, PeriodError, DEFAULT_LAG_MONTHS};
pub use remote::{select_matching, RemoteError, RemoteSession, RemoteSource, SessionGuard};
pub use run_log::{LogEntry, RunLog};
