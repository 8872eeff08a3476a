pub mod ast;
pub mod codegen;
pub mod convert;
pub mod lexer;
mod normalize;
pub mod parser;
pub mod types;

use wasm_bindgen::prelude::*;

pub use ast::DatabaseSchema;
pub use codegen::{GeneratorOptions, PrismaGenerator, TypeOrmGenerator};
pub use convert::{convert, Artifact, ConvertError, ConvertOptions, OutputFormat};
pub use parser::{parse, parse_with, ParseError, ParseOptions};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Parse DBML source into pretty-printed schema JSON
#[wasm_bindgen(js_name = "parseDbml")]
pub fn parse_dbml(source: &str) -> Result<String, String> {
    let schema = parser::parse(source).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&schema).map_err(|e| e.to_string())
}

/// Convert DBML source to `[{ filename, content }]` in the given format
#[wasm_bindgen(js_name = "convertDbml")]
pub fn convert_dbml(source: &str, format: &str) -> Result<js_sys::Array, String> {
    let format: OutputFormat = format.parse().map_err(|e: ConvertError| e.to_string())?;
    let artifacts = convert(source, format, &ConvertOptions::default()).map_err(|e| e.to_string())?;

    let files = js_sys::Array::new();
    for artifact in artifacts {
        let file = js_sys::Object::new();
        js_sys::Reflect::set(&file, &"filename".into(), &artifact.filename.into())
            .map_err(|_| "Failed to set filename".to_string())?;
        js_sys::Reflect::set(&file, &"content".into(), &artifact.content.into())
            .map_err(|_| "Failed to set content".to_string())?;
        files.push(&file);
    }
    Ok(files)
}
