#![no_main]

use libfuzzer_sys::fuzz_target;
use pgcord::FromSql;

fuzz_target!(|data: &[u8]| {
    let _ = Vec::<Option<String>>::from_sql(Some(data));
    let _ = Vec::<i64>::from_sql(Some(data));
    let _ = <[i32; 4]>::from_sql(Some(data));
});
