pub mod payload;

pub use payload::OnboardPayload;
