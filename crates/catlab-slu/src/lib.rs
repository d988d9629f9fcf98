//! SLU preprocessing: swap database values for category labels before
//! parsing and put them back afterwards.
//!
//! [`SluPreprocessing`] holds the shared [`CategoryLabelDatabase`] and a
//! [`Normalizer`]; [`handlers::router`] exposes both over JSON.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use catlab_db::CategoryLabelDatabase;
//! use catlab_normalize::Normalizer;
//! use catlab_slu::SluPreprocessing;
//! use catlab_types::Utterance;
//! use serde_json::json;
//!
//! let db = CategoryLabelDatabase::from_source(&json!({
//!     "city": {"Prague": ["prague", "praha"]},
//! }))
//! .unwrap();
//! let pre = SluPreprocessing::new(Arc::new(db), Normalizer::default());
//! let utt = pre.normalize(&Utterance::new("I'm going to Praha"));
//! let (abstracted, labels) = pre.values_to_category_labels(&utt);
//! assert_eq!(abstracted.to_string(), "i am going to CITY");
//! assert_eq!(pre.category_labels_to_values(&abstracted, &labels), utt);
//! ```
//!
//! [`CategoryLabelDatabase`]: catlab_db::CategoryLabelDatabase
//! [`Normalizer`]: catlab_normalize::Normalizer

pub mod handlers;
pub mod parser;
pub mod preprocess;

pub use handlers::{AppState, router};
pub use parser::{CategoryLabelParser, Input, SluError, SluParser};
pub use preprocess::SluPreprocessing;
