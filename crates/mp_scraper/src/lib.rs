pub mod assembler;
pub mod enrichment;
pub mod extractor;
pub mod fetch;
pub mod manager;

pub use assembler::{assemble_content, build_record};
pub use enrichment::{image_extension, EnrichmentReport, ImageEnricher};
pub use extractor::{Extractor, SelectorChain};
pub use fetch::HttpFetcher;
pub use manager::ArticlePipeline;

pub mod prelude {
    pub use super::manager::ArticlePipeline;
    pub use mp_core::{ArticleDocument, ProcessedArticle, Result, Error};
}
