pub mod check_access;
pub mod description_client;
pub mod files_filter;
pub mod metadata;
pub mod process_timer;
pub mod response_parser;

pub use check_access::check_access;
pub use description_client::{build_prompt, DescriptionClient, LlmDescriptionClient};
pub use files_filter::filter_files_by_extension;
pub use metadata::{read_caption, IptcWriter, MetadataWriter};
pub use process_timer::{execution_timer, format_elapsed, ProcessTimer};
pub use response_parser::{parse_response, ResponseParser, SectionLabels};
