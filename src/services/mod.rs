//! Service layer module root.
//! Placeholder allocation, ByteRange resolution, PKCS#7 assembly and
//! verification.

pub mod embedder;
pub mod pkcs7_builder;
pub mod pkcs7_parser;
pub mod placeholder;
pub mod resolver;
pub mod verification;

pub use embedder::PdfSignatureEmbedderService;
pub use pkcs7_builder::Pkcs7BuilderService;
pub use pkcs7_parser::{parse_signed_data, signer_certificate};
pub use placeholder::{PlaceholderAllocator, PlaceholderOptions, SignatureAppearance};
pub use resolver::{ByteRangeResolver, PreparedDocument};
pub use verification::VerificationService;
