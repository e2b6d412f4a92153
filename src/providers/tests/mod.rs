mod search_tests;
mod twitter_tests;
