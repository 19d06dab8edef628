pub mod constants;
pub mod crypto;
pub mod pdf;
pub mod pkcs7;
pub mod verification;
