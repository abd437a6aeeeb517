pub mod record_id;

pub use record_id::normalize_record_id;
