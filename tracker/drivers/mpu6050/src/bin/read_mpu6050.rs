use gyro_traits::GyroBus;
use linux_mpu6050::{Mpu6050Bus, PRIMARY_ADDR, SECONDARY_ADDR};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut bus = Mpu6050Bus::open("/dev/i2c-1", &[PRIMARY_ADDR, SECONDARY_ADDR])?;
    println!("Reading MPU-6050 gyro pair...");

    loop {
        for address in [PRIMARY_ADDR, SECONDARY_ADDR] {
            match bus.read_rate(address) {
                Ok(rate) => println!(
                    "0x{:02X} raw:  x={: >6} y={: >6} z={: >6}",
                    address, rate.x, rate.y, rate.z
                ),
                Err(e) => eprintln!("Error reading 0x{:02X}: {}", address, e),
            }
            if let Some(imu) = bus.device_mut(address) {
                if let Ok(dps) = imu.read_gyroscope_dps() {
                    println!(
                        "0x{:02X} gyro: x={:.2} °/s, y={:.2} °/s, z={:.2} °/s",
                        address, dps[0], dps[1], dps[2]
                    );
                }
            }
        }

        println!("----------------------------------------");
        thread::sleep(Duration::from_millis(100));
    }
}
