// Handwritten to match `db::CREATE_READING_TABLE`.

diesel::table! {
    readings (record_type, timestamp) {
        record_type -> Integer,
        timestamp -> BigInt,
        did -> Text,
        name -> Text,
        ts -> BigInt,
        lsid -> Nullable<BigInt>,
        data_structure_type -> BigInt,
        temp -> Nullable<Double>,
        hum -> Nullable<Double>,
        dew_point -> Nullable<Double>,
        wet_bulb -> Nullable<Double>,
        heat_index -> Nullable<Double>,
        pm_1_last -> Nullable<BigInt>,
        pm_2p5_last -> Nullable<BigInt>,
        pm_10_last -> Nullable<BigInt>,
        pm_1 -> Nullable<Double>,
        pm_2p5 -> Nullable<Double>,
        pm_2p5_last_1_hour -> Nullable<Double>,
        pm_2p5_last_3_hours -> Nullable<Double>,
        pm_2p5_last_24_hours -> Nullable<Double>,
        pm_2p5_nowcast -> Nullable<Double>,
        pm_10 -> Nullable<Double>,
        pm_10_last_1_hour -> Nullable<Double>,
        pm_10_last_3_hours -> Nullable<Double>,
        pm_10_last_24_hours -> Nullable<Double>,
        pm_10_nowcast -> Nullable<Double>,
        last_report_time -> Nullable<BigInt>,
        pct_pm_data_last_1_hour -> Nullable<BigInt>,
        pct_pm_data_last_3_hours -> Nullable<BigInt>,
        pct_pm_data_nowcast -> Nullable<BigInt>,
        pct_pm_data_last_24_hours -> Nullable<BigInt>,
    }
}
