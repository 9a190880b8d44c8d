mod tests_lru;
