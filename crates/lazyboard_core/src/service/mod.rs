//! Use-case services over a `BoardStore`.

pub mod board_service;

pub use board_service::{BoardService, BoardServiceError, BoardServiceResult, OpenedBoard};
