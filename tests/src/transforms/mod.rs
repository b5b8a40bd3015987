mod array_access;
mod control_flow;
mod pipeline;
mod shuffle;
