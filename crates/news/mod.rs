pub mod news_client;
