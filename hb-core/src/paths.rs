//! Candidate source paths for each canonical fact
//!
//! Each list is tried in order. Legacy vehicles report under `Body.*` and
//! `LowVoltageBattery.*`, newer software generations under `Cabin.*` and
//! `Electronics.*`.

pub const BATTERY_RATIO: &[&str] = &["Green.BatteryManagement.BatteryRemain.Ratio"];

pub const RANGE_TOTAL: &[&str] = &["Drivetrain.FuelSystem.DTE.Total"];

/// 0 means the 12V battery is healthy
pub const AUX_FAIL_WARNING: &[&str] = &["Electronics.Battery.Auxiliary.FailWarning"];

/// 1 means the 12V battery is healthy
pub const AUX_LEGACY_STATUS: &[&str] = &["LowVoltageBattery.BatteryStatus"];

/// 0 means locked. The legacy namespace wins when both report.
pub const DRIVER_LOCK: &[&str] = &["Body.Door.Row1.Driver.Lock", "Cabin.Door.Row1.Driver.Lock"];

pub const DOOR_FRONT_LEFT: &[&str] = &["Cabin.Door.Row1.Driver.Open", "Body.Door.Row1.Driver.Open"];
pub const DOOR_FRONT_RIGHT: &[&str] = &[
    "Cabin.Door.Row1.Passenger.Open",
    "Body.Door.Row1.Passenger.Open",
];
pub const DOOR_REAR_LEFT: &[&str] = &["Cabin.Door.Row2.Left.Open", "Body.Door.Row2.Left.Open"];
pub const DOOR_REAR_RIGHT: &[&str] = &["Cabin.Door.Row2.Right.Open", "Body.Door.Row2.Right.Open"];
pub const TRUNK_OPEN: &[&str] = &["Body.Trunk.Open", "Cabin.Trunk.Open"];
pub const HOOD_OPEN: &[&str] = &["Body.Hood.Open", "Cabin.Hood.Open"];

pub const BLOWER_SPEED: &[&str] = &["Cabin.HVAC.Row1.Driver.Blower.SpeedLevel"];
pub const HVAC_TEMPERATURE: &[&str] = &["Cabin.HVAC.Row1.Driver.Temperature.Value"];

/// 2 is reported for "off" on some seat modules
pub const SEAT_CLIMATE: &[&str] = &["Cabin.Seat.Row1.Driver.Climate.State"];
pub const WHEEL_HEAT: &[&str] = &["SteeringWheel.Heat.State", "Cabin.SteeringWheel.Heat.State"];
pub const REAR_DEFOG: &[&str] = &["Body.Windshield.Rear.Defog.State"];

pub const CHARGE_SEQUENCE: &[&str] = &["Green.ChargingInformation.SequenceDetails"];
pub const CONNECTOR_FASTENING: &[&str] = &["Green.ChargingInformation.ConnectorFastening.State"];
pub const CHARGE_REMAIN_TIME: &[&str] = &["Green.ChargingInformation.Charging.RemainTime"];

pub const LAST_UPDATE: &[&str] = &["Location.Date", "lastUpdateTime"];
