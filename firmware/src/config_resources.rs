// Provide a mapping for the controller GPIO pins

//
//| GPIO # | Name      | Description                                                   |
//| ------ | --------- | ------------------------------------------------------------- |
//| 2      | BTN_ON    | Input from the ON push button. Active low.                    |
//| 3      | BTN_OFF   | Input from the OFF push button. Active low.                   |
//| 4      | RELAY     | Relay driver output. Active high, energises the load.         |
//| 14     | I2C1_SDA  | I2C1 data line. Host is primary, the controller is secondary. |
//| 15     | I2C1_SCL  | I2C1 clock line. Host is primary, the controller is secondary.|
//| 26     | CT0       | Analog: current transformer channel 0.                        |
//| 27     | CT1       | Analog: current transformer channel 1.                        |
//| 28     | CT2       | Analog: current transformer channel 2.                        |
//| 29     | CT3       | Analog: current transformer channel 3.                        |

use assign_resources::assign_resources;
use embassy_rp::peripherals;

assign_resources! {
  sensors: SensorResources {
    adc: ADC,
    ct0: PIN_26,
    ct1: PIN_27,
    ct2: PIN_28,
    ct3: PIN_29,
  },
  controls: ControlResources {
    on_button: PIN_2,
    off_button: PIN_3,
    relay: PIN_4,
  },
  i2cs: I2CSecondaryResources {
    sda: PIN_14,
    scl: PIN_15,
    i2c: I2C1,
  },
}
