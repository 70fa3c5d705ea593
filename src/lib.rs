//! Cinevault - a server-rendered movie catalog
//!
//! Anyone can browse the catalog; registered users add movies and only the
//! owner of a movie may edit or delete it.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod views;
