// SQLite backend
//
// - params: conversion from `RowValues` to rusqlite values
// - query: row extraction and slot binding
// - driver: the `Driver` implementation over one rusqlite connection

pub mod driver;
pub mod params;
pub mod query;

pub use driver::SqliteDriver;
pub use params::Params;
