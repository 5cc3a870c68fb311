mod test_queued_before_open;
mod test_scan_flow;
