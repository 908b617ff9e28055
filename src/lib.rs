pub mod core;
pub mod crawler;
pub mod llm;
pub mod nodes;
pub mod rag;
pub mod server;
pub mod state;
pub mod toc;
pub mod vector_math;
