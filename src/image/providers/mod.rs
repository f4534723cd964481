//! Image generation provider adapters.

mod http;
mod imagen;
mod mock;
mod openai;
mod xai;

pub use imagen::{ImagenAdapter, ImagenAdapterBuilder, ImagenModel};
pub use mock::MockAdapter;
pub use openai::{OpenAiAdapter, OpenAiAdapterBuilder, OpenAiImageModel};
pub use xai::{XaiAdapter, XaiAdapterBuilder, XaiModel};
