mod chat_tests;
mod lifecycle_tests;
