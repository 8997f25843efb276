mod signed_payloads;
mod tamper;
