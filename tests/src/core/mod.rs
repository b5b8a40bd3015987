mod rewrite;
mod scramble;
