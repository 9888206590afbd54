//! Publishers: CareerDocs Publisher (admits pending batches onto
//! `career_docs_queue`, minting a correlation id per job) and Dispatch
//! Publisher (fans an assembled application out to `providers_queue` or
//! `skyvern_queue` by portal). The split follows `career_docs_publisher.py`
//! and `generic_publisher.py`/`appliers_config.py`.

mod career_docs;
mod dispatch;

pub use career_docs::CareerDocsPublisher;
pub use dispatch::DispatchPublisher;
