mod basic;
mod config;
mod create;
mod info;
mod utils;
