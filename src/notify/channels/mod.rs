// src/notify/channels/mod.rs

pub mod chat;
pub mod inapp;
pub mod webhook;
